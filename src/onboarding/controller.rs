//! OnboardingController — step guard, section validation, and progression.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{self, ConfigUpdate, FINAL_STEP, OnboardingConfig, StoredConfig};
use super::model::{
    CredentialsRequest, SectionInput, StepView, UserAccount, UserPatch, UserSummary,
    step_title,
};
use super::resolver::{SectionSet, sections_for_step};
use super::state::{OnboardingState, StepGuard};
use super::validation::validate_sections;
use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::error::{AuthError, DatabaseError, OnboardingError};
use crate::store::Database;

/// Runtime knobs the controller needs from the server configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub bcrypt_cost: u32,
    pub allow_plaintext_login: bool,
    pub clear_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            allow_plaintext_login: false,
            clear_timeout: Duration::from_secs(10),
        }
    }
}

/// Coordinates the wizard: which sections a step shows, what a submission
/// must contain, and where the user goes next.
pub struct OnboardingController {
    db: Arc<dyn Database>,
    settings: ControllerSettings,
}

impl OnboardingController {
    pub fn new(db: Arc<dyn Database>, settings: ControllerSettings) -> Self {
        Self { db, settings }
    }

    // ── Configuration ───────────────────────────────────────────────

    /// The current configuration, created with defaults on first access.
    pub async fn get_config(&self) -> Result<StoredConfig, OnboardingError> {
        Ok(self
            .db
            .get_or_create_config(&OnboardingConfig::default())
            .await?)
    }

    /// Validate and store a full replacement configuration.
    ///
    /// Nothing is written when validation fails.
    pub async fn update_config(
        &self,
        candidate: &ConfigUpdate,
    ) -> Result<StoredConfig, OnboardingError> {
        let validated = config::validate(candidate).inspect_err(|e| {
            warn!(error = %e, "Rejected onboarding config update");
        })?;

        if candidate.expected_version.is_some() {
            // The version check only applies to an existing record.
            self.get_config().await?;
        }

        match self
            .db
            .put_config(&validated, candidate.expected_version)
            .await?
        {
            Some(stored) => {
                info!(config = ?stored.config, version = stored.version, "Onboarding config updated");
                Ok(stored)
            }
            None => {
                let current = self.get_config().await?;
                let expected = candidate.expected_version.unwrap_or_default();
                warn!(expected, found = current.version, "Onboarding config version conflict");
                Err(OnboardingError::ConfigVersionConflict {
                    expected,
                    found: current.version,
                })
            }
        }
    }

    // ── Wizard steps ────────────────────────────────────────────────

    /// Sections `user` must fill in on `step`. A finished user is never asked
    /// for anything.
    pub fn sections_to_render(
        config: &OnboardingConfig,
        user: &UserAccount,
        step: u8,
    ) -> SectionSet {
        if user.state().is_terminal() {
            return SectionSet::default();
        }
        sections_for_step(config, step)
    }

    /// Describe what `step` should render for a user.
    pub async fn render_step(&self, user_id: Uuid, step: u8) -> Result<StepView, OnboardingError> {
        let user = self.load_user(user_id).await?;
        let state = user.state();

        let shown_step = match state.guard(step) {
            StepGuard::Proceed => step,
            StepGuard::Completed => FINAL_STEP,
            StepGuard::Redirect { current } => {
                debug!(%user_id, current, requested = step, "Step view redirected");
                return Err(OnboardingError::OutOfSequence {
                    user_id,
                    current,
                    requested: step,
                });
            }
        };

        let config = self.get_config().await?;
        let sections = Self::sections_to_render(&config.config, &user, shown_step);
        Ok(StepView {
            user_id,
            step: shown_step,
            state: state.as_str(),
            title: step_title(shown_step),
            prefill: user.section_values(&sections),
            sections,
            is_final: shown_step == FINAL_STEP,
        })
    }

    /// Accept the data for the user's current step and advance.
    ///
    /// Only sections assigned to `step` are read from `input`. On a
    /// validation failure nothing is stored.
    pub async fn submit_step(
        &self,
        user_id: Uuid,
        step: u8,
        input: &SectionInput,
    ) -> Result<UserAccount, OnboardingError> {
        let mut user = self.load_user(user_id).await?;
        let state = user.state();

        match state.guard(step) {
            StepGuard::Proceed => {}
            StepGuard::Completed => return Err(OnboardingError::AlreadyComplete),
            StepGuard::Redirect { current } => {
                warn!(%user_id, current, requested = step, "Out-of-sequence step submission");
                return Err(OnboardingError::OutOfSequence {
                    user_id,
                    current,
                    requested: step,
                });
            }
        }

        let config = self.get_config().await?;
        let required = Self::sections_to_render(&config.config, &user, step);
        let values = validate_sections(&required, input).map_err(OnboardingError::Validation)?;

        let next = state.next().ok_or(OnboardingError::AlreadyComplete)?;
        user.apply_sections(values);
        user.set_state(next);
        user.updated_at = Utc::now();

        self.write_progress(&mut user, step, step).await?;

        if next.is_terminal() {
            info!(%user_id, "Onboarding complete");
        } else {
            info!(%user_id, from = step, to = next.step(), "Onboarding step advanced");
        }
        Ok(user)
    }

    // ── Accounts ────────────────────────────────────────────────────

    /// Create an account on the account-creation step.
    pub async fn register(
        &self,
        request: &CredentialsRequest,
    ) -> Result<UserSummary, OnboardingError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || !email.contains('@') {
            return Err(OnboardingError::InvalidRequest(
                "a valid email is required".into(),
            ));
        }
        let password = SecretString::from(request.password.clone());
        if !password_is_acceptable(&password) {
            return Err(OnboardingError::InvalidRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(OnboardingError::UserExists);
        }

        let cost = self.settings.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;

        let user = UserAccount::new(email, hash);
        match self.db.create_user(&user).await {
            Ok(()) => {}
            Err(DatabaseError::Constraint(_)) => return Err(OnboardingError::UserExists),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, "User registered");
        Ok(user.summary())
    }

    /// Check credentials. Unknown email and wrong password stay distinct.
    pub async fn login(&self, request: &CredentialsRequest) -> Result<UserSummary, OnboardingError> {
        let email = normalize_email(&request.email);
        let user = self
            .db
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        let password = SecretString::from(request.password.clone());
        let stored = user.password_hash.clone();
        let allow_plaintext = self.settings.allow_plaintext_login;
        let matched = tokio::task::spawn_blocking(move || {
            auth::verify_password(&password, &stored, allow_plaintext)
        })
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))??;

        if !matched {
            warn!(user_id = %user.id, "Login failed: incorrect password");
            return Err(AuthError::IncorrectPassword.into());
        }

        debug!(user_id = %user.id, "User logged in");
        Ok(user.summary())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserAccount, OnboardingError> {
        self.load_user(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>, OnboardingError> {
        Ok(self.db.list_users().await?)
    }

    /// Overwrite section values and/or move progress forward outside the
    /// step flow.
    ///
    /// Every section present in the patch is validated. The step may only
    /// grow within 1..=3, completion requires the final step, and a completed
    /// user can no longer be changed.
    pub async fn update_user(
        &self,
        id: Uuid,
        patch: &UserPatch,
    ) -> Result<UserAccount, OnboardingError> {
        let mut user = self.load_user(id).await?;
        if user.onboarding_complete {
            return Err(OnboardingError::AlreadyComplete);
        }

        let input = patch.sections();
        let values =
            validate_sections(&input.present(), &input).map_err(OnboardingError::Validation)?;

        let current = user.onboarding_step;
        let step = match patch.onboarding_step {
            None => current,
            Some(step) => {
                let step = u8::try_from(step)
                    .ok()
                    .filter(|s| (1..=FINAL_STEP).contains(s))
                    .ok_or_else(|| {
                        OnboardingError::InvalidRequest(format!(
                            "onboardingStep must be between 1 and {FINAL_STEP}"
                        ))
                    })?;
                if step < current {
                    return Err(OnboardingError::InvalidRequest(
                        "onboardingStep cannot decrease".into(),
                    ));
                }
                step
            }
        };

        let complete = patch.onboarding_complete.unwrap_or(false);
        if complete && step != FINAL_STEP {
            return Err(OnboardingError::InvalidRequest(format!(
                "onboarding can only be completed on step {FINAL_STEP}"
            )));
        }

        user.apply_sections(values);
        user.set_state(OnboardingState::from_progress(step, complete));
        user.updated_at = Utc::now();

        self.write_progress(&mut user, current, step).await?;
        info!(user_id = %id, step, complete, "User record updated");
        Ok(user)
    }

    /// Delete every user record.
    pub async fn clear_all_users(&self) -> Result<usize, OnboardingError> {
        let timeout = self.settings.clear_timeout;
        let deleted = tokio::time::timeout(timeout, self.db.delete_all_users())
            .await
            .map_err(|_| OnboardingError::Timeout {
                operation: "clear all users".into(),
                timeout,
            })??;

        info!(deleted, "All users cleared");
        Ok(deleted)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn load_user(&self, id: Uuid) -> Result<UserAccount, OnboardingError> {
        self.db
            .get_user(id)
            .await?
            .ok_or(OnboardingError::NotFound { id })
    }

    /// Persist `user` if nobody wrote it since it was loaded, then bump its
    /// revision. On a miss the fresh row decides the error.
    async fn write_progress(
        &self,
        user: &mut UserAccount,
        loaded_step: u8,
        requested: u8,
    ) -> Result<(), OnboardingError> {
        if self.db.update_user(user, user.revision).await? {
            user.revision += 1;
            return Ok(());
        }

        let latest = self.load_user(user.id).await?;
        warn!(
            user_id = %user.id,
            current = latest.onboarding_step,
            complete = latest.onboarding_complete,
            requested,
            "Concurrent user update"
        );
        if latest.onboarding_complete {
            return Err(OnboardingError::AlreadyComplete);
        }
        if latest.onboarding_step != loaded_step {
            return Err(OnboardingError::OutOfSequence {
                user_id: user.id,
                current: latest.onboarding_step,
                requested,
            });
        }
        Err(OnboardingError::UserModified { id: user.id })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether `password` would be accepted at registration.
pub fn password_is_acceptable(password: &SecretString) -> bool {
    password.expose_secret().chars().count() >= MIN_PASSWORD_LEN
}
