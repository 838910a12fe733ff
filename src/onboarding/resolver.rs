//! Resolves which profile sections are shown on a given wizard step.

use serde::{Deserialize, Serialize};

use super::config::{ACCOUNT_STEP, OnboardingConfig};

/// A profile data group collected during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    AboutMe,
    Address,
    Birthdate,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::AboutMe, Section::Address, Section::Birthdate];

    /// Wire name, also used as the field-error key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AboutMe => "aboutMe",
            Self::Address => "address",
            Self::Birthdate => "birthdate",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visibility flags for the three sections on one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSet {
    pub about_me: bool,
    pub address: bool,
    pub birthdate: bool,
}

impl SectionSet {
    pub fn contains(&self, section: Section) -> bool {
        match section {
            Section::AboutMe => self.about_me,
            Section::Address => self.address,
            Section::Birthdate => self.birthdate,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.about_me || self.address || self.birthdate)
    }

    /// Visible sections in display order.
    pub fn iter(&self) -> impl Iterator<Item = Section> + '_ {
        Section::ALL.into_iter().filter(|s| self.contains(*s))
    }
}

/// Sections visible on `step` under `config`.
///
/// The account-creation step and any step outside the wizard resolve to an
/// empty set.
pub fn sections_for_step(config: &OnboardingConfig, step: u8) -> SectionSet {
    if step == ACCOUNT_STEP {
        return SectionSet::default();
    }
    SectionSet {
        about_me: config.about_me_page == step,
        address: config.address_page == step,
        birthdate: config.birthdate_page == step,
    }
}
