//! Error taxonomy shared by the API client, session manager and CLI.
//!
//! PROPAGATION
//! ===========
//! Transport and invalid-response errors from `login` reach the caller for
//! display. `logout` and `revalidate` never return errors; they resolve by
//! transitioning session state instead.

// =============================================================================
// ERROR CODE
// =============================================================================

/// Stable machine-readable code attached to every error surfaced to the shell.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// PORTAL ERROR
// =============================================================================

/// Errors produced by portal operations.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend rejected the session token (HTTP 401).
    #[error("session is no longer authorized")]
    Unauthorized,

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}")]
    Status { status: u16, body: String },

    /// The login response lacked a success marker, token or user.
    #[error("invalid login response")]
    InvalidLoginResponse,

    /// A client-side form check failed before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// The current user lacks the role a view or action requires.
    #[error("You do not have permission to access this page.")]
    Forbidden,

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// A payload could not be encoded or decoded.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    /// Convenience constructor for form validation failures.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl ErrorCode for PortalError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::Unauthorized => "E_UNAUTHORIZED",
            Self::Status { .. } => "E_STATUS",
            Self::InvalidLoginResponse => "E_INVALID_LOGIN_RESPONSE",
            Self::Validation(_) => "E_VALIDATION",
            Self::Forbidden => "E_FORBIDDEN",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Json(_) => "E_JSON",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// CONFIG ERROR
// =============================================================================

/// Errors produced while reading portal configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {var}")]
    Missing { var: &'static str },

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
