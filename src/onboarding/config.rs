//! Onboarding configuration — which wizard step each profile section lives on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resolver::Section;
use crate::error::InvalidConfigError;

/// Step 1 is always the account-creation form.
pub const ACCOUNT_STEP: u8 = 1;
/// Steps a section may be assigned to.
pub const COLLECT_STEPS: [u8; 2] = [2, 3];
/// Last step of the wizard; passing it completes onboarding.
pub const FINAL_STEP: u8 = 3;

/// Mapping of each profile section to a wizard step.
///
/// Only values produced by [`validate`] (or [`Default`]) are guaranteed to
/// satisfy the no-empty-step invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingConfig {
    pub about_me_page: u8,
    pub address_page: u8,
    pub birthdate_page: u8,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            about_me_page: 2,
            address_page: 2,
            birthdate_page: 3,
        }
    }
}

impl OnboardingConfig {
    /// The step a section is assigned to.
    pub fn page_for(&self, section: Section) -> u8 {
        match section {
            Section::AboutMe => self.about_me_page,
            Section::Address => self.address_page,
            Section::Birthdate => self.birthdate_page,
        }
    }

    /// Number of sections assigned to `step`.
    pub fn sections_on(&self, step: u8) -> usize {
        Section::ALL
            .iter()
            .filter(|s| self.page_for(**s) == step)
            .count()
    }
}

/// Candidate configuration as submitted by an admin.
///
/// Values are wide integers so out-of-range input is reported by the
/// validator instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigUpdate {
    pub about_me_page: i64,
    pub address_page: i64,
    pub birthdate_page: i64,
    /// When set, the write only applies if the stored version still matches.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl ConfigUpdate {
    pub fn new(about_me_page: i64, address_page: i64, birthdate_page: i64) -> Self {
        Self {
            about_me_page,
            address_page,
            birthdate_page,
            expected_version: None,
        }
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

impl From<OnboardingConfig> for ConfigUpdate {
    fn from(config: OnboardingConfig) -> Self {
        Self::new(
            config.about_me_page.into(),
            config.address_page.into(),
            config.birthdate_page.into(),
        )
    }
}

/// Validate a candidate configuration.
///
/// Each assignment must be 2 or 3, and both steps must receive at least one
/// section.
pub fn validate(candidate: &ConfigUpdate) -> Result<OnboardingConfig, InvalidConfigError> {
    let config = OnboardingConfig {
        about_me_page: page_value("aboutMePage", candidate.about_me_page)?,
        address_page: page_value("addressPage", candidate.address_page)?,
        birthdate_page: page_value("birthdatePage", candidate.birthdate_page)?,
    };

    if COLLECT_STEPS.iter().any(|step| config.sections_on(*step) == 0) {
        return Err(InvalidConfigError::empty_step());
    }
    Ok(config)
}

fn page_value(field: &str, value: i64) -> Result<u8, InvalidConfigError> {
    u8::try_from(value)
        .ok()
        .filter(|v| COLLECT_STEPS.contains(v))
        .ok_or_else(|| InvalidConfigError::out_of_range(field))
}

/// The persisted singleton record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfig {
    #[serde(flatten)]
    pub config: OnboardingConfig,
    /// Incremented on every accepted write; starts at 1.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}
