//! User records and request/response payloads for onboarding.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::config::ACCOUNT_STEP;
use super::resolver::SectionSet;
use super::state::OnboardingState;

/// Mailing address collected in the address section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// A registered user and their onboarding progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub onboarding_step: u8,
    pub onboarding_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every stored write; guards conditional updates.
    #[serde(skip_serializing)]
    pub revision: i64,
}

impl UserAccount {
    /// A freshly registered user on the account-creation step.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            onboarding_step: ACCOUNT_STEP,
            onboarding_complete: false,
            about_me: None,
            address: None,
            birthdate: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn state(&self) -> OnboardingState {
        OnboardingState::from_progress(self.onboarding_step, self.onboarding_complete)
    }

    pub fn set_state(&mut self, state: OnboardingState) {
        let (step, complete) = state.progress();
        self.onboarding_step = step;
        self.onboarding_complete = complete;
    }

    /// Overwrite the sections present in `values`; absent ones are kept.
    pub fn apply_sections(&mut self, values: SectionValues) {
        if let Some(about_me) = values.about_me {
            self.about_me = Some(about_me);
        }
        if let Some(address) = values.address {
            self.address = Some(address);
        }
        if let Some(birthdate) = values.birthdate {
            self.birthdate = Some(birthdate);
        }
    }

    /// Stored values of the sections in `sections`.
    pub fn section_values(&self, sections: &SectionSet) -> SectionValues {
        SectionValues {
            about_me: self.about_me.clone().filter(|_| sections.about_me),
            address: self.address.clone().filter(|_| sections.address),
            birthdate: self.birthdate.filter(|_| sections.birthdate),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            onboarding_step: self.onboarding_step,
            onboarding_complete: self.onboarding_complete,
        }
    }
}

/// Minimal identity returned by registration and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub onboarding_step: u8,
    pub onboarding_complete: bool,
}

/// Validated section data, one entry per section that was collected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
}

// ── Requests ────────────────────────────────────────────────────────

/// `POST /api/users` and `POST /api/users/login` body.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Address as typed by the user; every part is checked by the validator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressInput {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

/// Raw section fields of a step submission.
///
/// Values stay untyped until validation so that sections the step does not
/// collect are ignored whatever their shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SectionInput {
    #[serde(default)]
    pub about_me: Option<Value>,
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub birthdate: Option<Value>,
}

impl SectionInput {
    /// The sections this input carries a value for.
    pub fn present(&self) -> SectionSet {
        SectionSet {
            about_me: self.about_me.is_some(),
            address: self.address.is_some(),
            birthdate: self.birthdate.is_some(),
        }
    }
}

/// `PUT /api/users/{id}` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserPatch {
    #[serde(default)]
    pub about_me: Option<Value>,
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub birthdate: Option<Value>,
    #[serde(default)]
    pub onboarding_step: Option<i64>,
    #[serde(default)]
    pub onboarding_complete: Option<bool>,
}

impl UserPatch {
    pub fn sections(&self) -> SectionInput {
        SectionInput {
            about_me: self.about_me.clone(),
            address: self.address.clone(),
            birthdate: self.birthdate.clone(),
        }
    }
}

// ── Responses ───────────────────────────────────────────────────────

/// What a wizard step should render for a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub user_id: Uuid,
    pub step: u8,
    pub state: &'static str,
    pub title: &'static str,
    pub sections: SectionSet,
    pub is_final: bool,
    /// Values the user already stored for the visible sections.
    pub prefill: SectionValues,
}

/// Heading shown for a wizard step.
pub fn step_title(step: u8) -> &'static str {
    match step {
        1 => "Create Your Account",
        2 => "Personal Information",
        _ => "Additional Details",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> Address {
        Address {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip: "62701".into(),
        }
    }

    #[test]
    fn new_user_starts_on_account_step() {
        let user = UserAccount::new("a@example.com", "hash");
        assert_eq!(user.onboarding_step, 1);
        assert!(!user.onboarding_complete);
        assert_eq!(user.state(), OnboardingState::AccountCreation);
        assert!(user.about_me.is_none());
    }

    #[test]
    fn serialization_hides_password_hash() {
        let user = UserAccount::new("a@example.com", "$2b$04$secret");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("secret"));
        assert_eq!(json["onboardingStep"], 1);
        assert_eq!(json["onboardingComplete"], false);
        assert!(json.get("revision").is_none());
    }

    #[test]
    fn birthdate_serializes_as_plain_date() {
        let mut user = UserAccount::new("a@example.com", "hash");
        user.birthdate = NaiveDate::from_ymd_opt(1990, 1, 15);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["birthdate"], "1990-01-15");
    }

    #[test]
    fn set_state_writes_progress_pair() {
        let mut user = UserAccount::new("a@example.com", "hash");
        user.set_state(OnboardingState::Collecting(3));
        assert_eq!((user.onboarding_step, user.onboarding_complete), (3, false));
        user.set_state(OnboardingState::Complete);
        assert_eq!((user.onboarding_step, user.onboarding_complete), (3, true));
    }

    #[test]
    fn apply_sections_keeps_absent_values() {
        let mut user = UserAccount::new("a@example.com", "hash");
        user.about_me = Some("old".into());
        user.apply_sections(SectionValues {
            address: Some(sample_address()),
            ..Default::default()
        });
        assert_eq!(user.about_me.as_deref(), Some("old"));
        assert_eq!(user.address, Some(sample_address()));
    }

    #[test]
    fn section_values_filters_by_visibility() {
        let mut user = UserAccount::new("a@example.com", "hash");
        user.about_me = Some("hi".into());
        user.address = Some(sample_address());
        let values = user.section_values(&SectionSet {
            about_me: false,
            address: true,
            birthdate: true,
        });
        assert!(values.about_me.is_none());
        assert!(values.address.is_some());
        assert!(values.birthdate.is_none());
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let result: Result<UserPatch, _> = serde_json::from_str(r#"{"nickname": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn section_input_reports_present_sections() {
        let input: SectionInput =
            serde_json::from_str(r#"{"aboutMe": "hello", "birthdate": "1990-01-15"}"#).unwrap();
        let present = input.present();
        assert!(present.about_me);
        assert!(!present.address);
        assert!(present.birthdate);
    }

    #[test]
    fn section_input_accepts_any_shape_per_section() {
        let input: SectionInput = serde_json::from_str(
            r#"{"birthdate": "1990-01-15", "aboutMe": 42, "address": {"country": "US"}}"#,
        )
        .unwrap();
        assert!(input.present().about_me);
        assert!(input.present().address);
        assert!(serde_json::from_str::<SectionInput>(r#"{"nickname": "x"}"#).is_err());
    }

    #[test]
    fn step_titles() {
        assert_eq!(step_title(1), "Create Your Account");
        assert_eq!(step_title(2), "Personal Information");
        assert_eq!(step_title(3), "Additional Details");
    }
}
