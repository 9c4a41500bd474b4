//! # portal
//!
//! Client-side session core for a small administrative portal backed by a
//! hosted script endpoint. The remote service owns users, validation and
//! business rules; this crate owns everything the client has to get right:
//! the persisted session, request auth context, periodic revalidation,
//! cross-tab logout propagation, role-filtered navigation and the users CRUD
//! round trips.
//!
//! ARCHITECTURE
//! ============
//! Leaf-first:
//! - `storage`: key-value backends plus the session storage bridge.
//! - `events`: decodes storage mutations into auth signals.
//! - `api`: the HTTP client and the typed `auth`/`users` calls.
//! - `session`: the session state machine and its background tasks.
//! - `nav`: roles, navigation filtering and permission gates.
//!
//! The `portal` binary in `main.rs` is the user-facing shell over these.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod nav;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::PortalConfig;
pub use error::PortalError;
pub use model::{Session, UserRecord};
pub use session::SessionManager;
