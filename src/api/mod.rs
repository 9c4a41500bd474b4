//! Remote endpoint access.
//!
//! `client` owns transport and auth context; `auth` and `users` are thin
//! typed wrappers around one action each.

pub mod auth;
pub mod client;
pub mod users;

pub use client::{ApiClient, ApiMethod, ApiRequest};
