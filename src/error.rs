//! Error types for the onboarding service.

use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Message reported when a configuration would leave a step without sections.
pub const EMPTY_STEP_MESSAGE: &str = "each step must have at least one component";

/// Rejected onboarding configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InvalidConfigError {
    pub message: String,
}

impl InvalidConfigError {
    pub fn empty_step() -> Self {
        Self {
            message: EMPTY_STEP_MESSAGE.to_string(),
        }
    }

    pub fn out_of_range(field: &str) -> Self {
        Self {
            message: format!("{field} must be 2 or 3"),
        }
    }
}

/// Field-keyed validation messages, e.g. `"address.zip" -> "..."`.
pub type FieldErrors = BTreeMap<String, String>;

/// Credential check failures. The two causes stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("user not found")]
    UnknownEmail,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Errors surfaced by the onboarding controller.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error(transparent)]
    InvalidConfig(#[from] InvalidConfigError),

    #[error("configuration was modified concurrently (expected version {expected}, found {found})")]
    ConfigVersionConflict { expected: i64, found: i64 },

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("step {requested} requested but user is on step {current}")]
    OutOfSequence { user_id: Uuid, current: u8, requested: u8 },

    #[error("onboarding already complete")]
    AlreadyComplete,

    #[error("user was modified concurrently, reload and retry")]
    UserModified { id: Uuid },

    #[error("user not found")]
    NotFound { id: Uuid },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("user already exists")]
    UserExists,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
