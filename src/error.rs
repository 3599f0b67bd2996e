//! Error types for seb-gate
//!
//! This module defines the error hierarchy used throughout the gate.
//! We use `thiserror` for library-style errors that are part of the API.
//! None of these ever reach the browser directly: the middleware turns
//! every fault into either a logged pass-through of the decision or a
//! plain denial page.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Unknown permission component '{name}'")]
    UnknownComponent { name: String },
}

/// Course and usage key parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid course key '{0}'")]
    InvalidCourseKey(String),

    #[error("Invalid usage key '{0}'")]
    InvalidUsageKey(String),
}

/// Ban store failures
#[derive(Error, Debug)]
pub enum BanStoreError {
    #[error("Ban store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write ban for '{username}' in {course}: {reason}")]
    WriteFailed {
        username: String,
        course: String,
        reason: String,
    },
}

/// Course resolver failures
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Course store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Template rendering failures
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template '{template}' failed: {reason}")]
    Failed { template: String, reason: String },
}

/// Permission component failures
///
/// A failing component is treated as "not satisfied" by the engine.
#[derive(Error, Debug)]
#[error("Permission component '{component}' failed: {reason}")]
pub struct PermissionError {
    pub component: String,
    pub reason: String,
}

impl PermissionError {
    pub fn new(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Header present but unusable (non-ASCII, wrong length)
    pub fn malformed_header(component: impl Into<String>, header: &str) -> Self {
        Self {
            component: component.into(),
            reason: format!("malformed header '{}'", header),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for ban store operations
pub type BanResult<T> = std::result::Result<T, BanStoreError>;

/// Result type alias for course lookups
pub type ResolverResult<T> = std::result::Result<T, ResolverError>;
