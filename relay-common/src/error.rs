//! Error types for the relay bot.

use thiserror::Error;

/// Result type alias using the relay error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and configuration errors.
///
/// Everything here is fatal: the process must not start serving traffic
/// when one of these is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// A required secret is absent or blank
    #[error("{description} not found: set the {var} environment variable")]
    MissingCredential {
        var: &'static str,
        description: &'static str,
    },

    /// An optional setting is present but cannot be used
    #[error("Invalid value for {var} ({value:?}): {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Configuration is well-formed but inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Name of the environment variable the error refers to, if any.
    pub const fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredential { var, .. } | Self::InvalidValue { var, .. } => Some(var),
            Self::Config(_) => None,
        }
    }

    /// Check if this is a missing credential error.
    pub const fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }
}
