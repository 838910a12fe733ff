//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::config::{OnboardingConfig, StoredConfig};
use crate::onboarding::model::UserAccount;

/// Backend-agnostic database trait covering the onboarding configuration
/// and user records.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Onboarding config ───────────────────────────────────────────

    /// Return the singleton configuration, inserting `default` first if no
    /// record exists yet.
    async fn get_or_create_config(
        &self,
        default: &OnboardingConfig,
    ) -> Result<StoredConfig, DatabaseError>;

    /// Replace all three assignments in one statement.
    ///
    /// With `expected_version`, the write only applies when the stored
    /// version matches; `Ok(None)` means it did not.
    async fn put_config(
        &self,
        config: &OnboardingConfig,
        expected_version: Option<i64>,
    ) -> Result<Option<StoredConfig>, DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a new user. A duplicate email is a `Constraint` error.
    async fn create_user(&self, user: &UserAccount) -> Result<(), DatabaseError>;

    /// Get a user by ID.
    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError>;

    /// Look up a user by (normalized) email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, DatabaseError>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<UserAccount>, DatabaseError>;

    /// Write back a user record if its stored revision still equals
    /// `expected_revision`, bumping the revision. Returns false when no row
    /// matched.
    async fn update_user(
        &self,
        user: &UserAccount,
        expected_revision: i64,
    ) -> Result<bool, DatabaseError>;

    /// Delete every user. Returns the number of users deleted.
    async fn delete_all_users(&self) -> Result<usize, DatabaseError>;
}
