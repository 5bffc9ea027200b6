//! Relay Common - Shared types and utilities for the relay bot.
//!
//! This crate provides:
//! - Configuration loaded from the process environment
//! - Error types for startup and configuration failures
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    CompletionConfig, Config, ConversationConfig, ObservabilityConfig, TelegramConfig,
};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
