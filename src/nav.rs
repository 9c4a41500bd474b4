//! Role-filtered navigation and permission gates.
//!
//! Everything here is a pure function of the current user. Callers recompute
//! on every render; nothing is cached.

use std::fmt;

use serde::Serialize;

use crate::error::PortalError;
use crate::model::UserRecord;

// =============================================================================
// ROLES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Super,
    Manager,
    Entry,
    Accountant,
}

impl Role {
    /// Every role, in the order the user form offers them.
    pub const ALL: [Role; 4] = [Role::Super, Role::Manager, Role::Entry, Role::Accountant];

    /// Parse a backend role token. Case and surrounding whitespace are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|r| r.as_str().eq_ignore_ascii_case(raw))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Super => "super",
            Self::Manager => "manager",
            Self::Entry => "entry",
            Self::Accountant => "accountant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub name: &'static str,
    pub path: &'static str,
    pub icon: &'static str,
    pub roles: &'static [Role],
}

pub const NAV_ITEMS: &[NavItem] = &[
    NavItem { name: "Home", path: "/", icon: "home", roles: &Role::ALL },
    NavItem {
        name: "Reports",
        path: "/reports",
        icon: "bar-chart",
        roles: &[Role::Super, Role::Manager, Role::Accountant],
    },
    NavItem { name: "Users", path: "/users", icon: "person", roles: USERS_VIEW_ROLES },
];

pub const USERS_VIEW_ROLES: &[Role] = &[Role::Super, Role::Manager];
pub const USER_DELETE_ROLES: &[Role] = &[Role::Super];

/// Items from `items` the user's role may see. Empty without a user or when
/// the role is not recognised.
#[must_use]
pub fn visible_items<'a>(items: &'a [NavItem], user: Option<&UserRecord>) -> Vec<&'a NavItem> {
    let Some(role) = user.and_then(|u| Role::parse(&u.role)) else {
        return Vec::new();
    };
    items.iter().filter(|item| item.roles.contains(&role)).collect()
}

// =============================================================================
// GATES
// =============================================================================

/// # Errors
///
/// `Forbidden` when there is no user or their role is not in `allowed`.
pub fn require_role(user: Option<&UserRecord>, allowed: &[Role]) -> Result<Role, PortalError> {
    user.and_then(|u| Role::parse(&u.role))
        .filter(|role| allowed.contains(role))
        .ok_or(PortalError::Forbidden)
}

/// # Errors
///
/// `Forbidden` unless the user is super or manager.
pub fn require_users_view(user: Option<&UserRecord>) -> Result<Role, PortalError> {
    require_role(user, USERS_VIEW_ROLES)
}

/// # Errors
///
/// `Forbidden` unless the user is super.
pub fn require_user_delete(user: Option<&UserRecord>) -> Result<Role, PortalError> {
    require_role(user, USER_DELETE_ROLES)
}

#[cfg(test)]
#[path = "nav_test.rs"]
mod tests;
