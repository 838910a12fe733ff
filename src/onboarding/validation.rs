//! Field validation for submitted profile sections.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;

use super::model::{Address, AddressInput, SectionInput, SectionValues};
use super::resolver::SectionSet;
use crate::error::FieldErrors;

/// Five digits, optionally followed by a hyphen and four more.
static ZIP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("ZIP pattern is valid"));

pub const ZIP_FORMAT_MESSAGE: &str = "ZIP code must be 5 digits or 5+4 digits (e.g. 12345 or 12345-6789)";
const ABOUT_ME_TYPE_MESSAGE: &str = "About me must be text";
const ADDRESS_SHAPE_MESSAGE: &str = "Address must be an object with street, city, state and zip";
const BIRTHDATE_FORMAT_MESSAGE: &str = "Birthdate must be a valid date (YYYY-MM-DD)";

/// Validate the sections in `required`, ignoring anything else in `input`.
///
/// Only required sections are interpreted; the others may hold any JSON.
/// Returns trimmed values for exactly the required sections, or every field
/// error found.
pub fn validate_sections(
    required: &SectionSet,
    input: &SectionInput,
) -> Result<SectionValues, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut values = SectionValues::default();

    if required.about_me {
        match input.about_me.as_ref().filter(|v| !v.is_null()) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                values.about_me = Some(text.trim().to_string());
            }
            Some(Value::String(_)) | None => {
                errors.insert("aboutMe".into(), "About me is required".into());
            }
            Some(_) => {
                errors.insert("aboutMe".into(), ABOUT_ME_TYPE_MESSAGE.into());
            }
        }
    }

    if required.address {
        match input.address.as_ref().filter(|v| !v.is_null()) {
            Some(raw) => match serde_json::from_value::<AddressInput>(raw.clone()) {
                Ok(address) => values.address = validate_address(&address, &mut errors),
                Err(_) => {
                    errors.insert("address".into(), ADDRESS_SHAPE_MESSAGE.into());
                }
            },
            None => {
                errors.insert("address".into(), "Address is required".into());
            }
        }
    }

    if required.birthdate {
        match input.birthdate.as_ref().filter(|v| !v.is_null()) {
            None => {
                errors.insert("birthdate".into(), "Birthdate is required".into());
            }
            Some(Value::String(raw)) if raw.trim().is_empty() => {
                errors.insert("birthdate".into(), "Birthdate is required".into());
            }
            Some(raw) => match raw.as_str().and_then(parse_birthdate) {
                Some(date) => values.birthdate = Some(date),
                None => {
                    errors.insert("birthdate".into(), BIRTHDATE_FORMAT_MESSAGE.into());
                }
            },
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

fn validate_address(input: &AddressInput, errors: &mut FieldErrors) -> Option<Address> {
    let before = errors.len();
    let mut part = |key: &str, label: &str, value: Option<&str>| {
        let value = non_empty(value);
        if value.is_none() {
            errors.insert(format!("address.{key}"), format!("{label} is required"));
        }
        value
    };

    let street = part("street", "Street", input.street.as_deref());
    let city = part("city", "City", input.city.as_deref());
    let state = part("state", "State", input.state.as_deref());
    let zip = part("zip", "ZIP code", input.zip.as_deref());

    if let Some(ref zip) = zip {
        if !is_valid_zip(zip) {
            errors.insert("address.zip".into(), ZIP_FORMAT_MESSAGE.into());
        }
    }

    if errors.len() != before {
        return None;
    }
    Some(Address {
        street: street?,
        city: city?,
        state: state?,
        zip: zip?,
    })
}

pub fn is_valid_zip(zip: &str) -> bool {
    ZIP_PATTERN.is_match(zip)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part is kept).
pub fn parse_birthdate(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address(zip: &str) -> Value {
        json!({"street": "1 Main St", "city": "Springfield", "state": "IL", "zip": zip})
    }

    fn only_address() -> SectionSet {
        SectionSet {
            address: true,
            ..Default::default()
        }
    }

    #[test]
    fn four_digit_zip_fails_with_format_error() {
        let input = SectionInput {
            address: Some(address("1234")),
            ..Default::default()
        };
        let errors = validate_sections(&only_address(), &input).unwrap_err();
        assert_eq!(errors["address.zip"], ZIP_FORMAT_MESSAGE);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn zip_plus_four_passes() {
        let input = SectionInput {
            address: Some(address("12345-6789")),
            ..Default::default()
        };
        let values = validate_sections(&only_address(), &input).unwrap();
        assert_eq!(values.address.unwrap().zip, "12345-6789");
    }

    #[test]
    fn zip_patterns() {
        assert!(is_valid_zip("12345"));
        assert!(is_valid_zip("12345-6789"));
        assert!(!is_valid_zip("1234"));
        assert!(!is_valid_zip("123456"));
        assert!(!is_valid_zip("12345-678"));
        assert!(!is_valid_zip("12345 6789"));
        assert!(!is_valid_zip("abcde"));
    }

    #[test]
    fn missing_address_parts_are_keyed() {
        let input = SectionInput {
            address: Some(json!({"street": "  ", "state": "IL", "zip": "62701"})),
            ..Default::default()
        };
        let errors = validate_sections(&only_address(), &input).unwrap_err();
        assert!(errors.contains_key("address.street"));
        assert!(errors.contains_key("address.city"));
        assert!(!errors.contains_key("address.state"));
    }

    #[test]
    fn missing_address_object_is_reported() {
        let errors = validate_sections(&only_address(), &SectionInput::default()).unwrap_err();
        assert_eq!(errors["address"], "Address is required");
    }

    #[test]
    fn about_me_must_not_be_blank() {
        let required = SectionSet {
            about_me: true,
            ..Default::default()
        };
        let input = SectionInput {
            about_me: Some("   ".into()),
            ..Default::default()
        };
        let errors = validate_sections(&required, &input).unwrap_err();
        assert_eq!(errors["aboutMe"], "About me is required");

        let input = SectionInput {
            about_me: Some("  I like hiking  ".into()),
            ..Default::default()
        };
        let values = validate_sections(&required, &input).unwrap();
        assert_eq!(values.about_me.as_deref(), Some("I like hiking"));
    }

    #[test]
    fn birthdate_formats() {
        assert_eq!(parse_birthdate("1990-01-15"), NaiveDate::from_ymd_opt(1990, 1, 15));
        assert_eq!(
            parse_birthdate("1990-01-15T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(1990, 1, 15)
        );
        assert!(parse_birthdate("1990-02-30").is_none());
        assert!(parse_birthdate("yesterday").is_none());
    }

    #[test]
    fn birthdate_errors() {
        let required = SectionSet {
            birthdate: true,
            ..Default::default()
        };
        let errors = validate_sections(&required, &SectionInput::default()).unwrap_err();
        assert_eq!(errors["birthdate"], "Birthdate is required");

        let input = SectionInput {
            birthdate: Some("15/01/1990".into()),
            ..Default::default()
        };
        let errors = validate_sections(&required, &input).unwrap_err();
        assert!(errors["birthdate"].contains("valid date"));
    }

    #[test]
    fn sections_not_required_are_ignored() {
        let required = SectionSet {
            birthdate: true,
            ..Default::default()
        };
        let input = SectionInput {
            about_me: Some("ignored".into()),
            address: Some(address("bad")),
            birthdate: Some("1990-01-15".into()),
        };
        let values = validate_sections(&required, &input).unwrap();
        assert!(values.about_me.is_none());
        assert!(values.address.is_none());
        assert!(values.birthdate.is_some());
    }

    #[test]
    fn off_step_sections_of_any_shape_are_ignored() {
        let required = SectionSet {
            birthdate: true,
            ..Default::default()
        };
        let input = SectionInput {
            about_me: Some(json!(42)),
            address: Some(json!({"street": "1 Main St", "country": "US"})),
            birthdate: Some(json!("1990-01-15")),
        };
        let values = validate_sections(&required, &input).unwrap();
        assert_eq!(values.birthdate, NaiveDate::from_ymd_opt(1990, 1, 15));
        assert!(values.about_me.is_none());
        assert!(values.address.is_none());
    }

    #[test]
    fn required_sections_of_wrong_shape_are_errors() {
        let required = SectionSet {
            about_me: true,
            address: true,
            birthdate: true,
        };
        let input = SectionInput {
            about_me: Some(json!(42)),
            address: Some(json!({"street": "1 Main St", "city": "Springfield", "state": "IL", "zip": "62701", "country": "US"})),
            birthdate: Some(json!(19900115)),
        };
        let errors = validate_sections(&required, &input).unwrap_err();
        assert_eq!(errors["aboutMe"], ABOUT_ME_TYPE_MESSAGE);
        assert_eq!(errors["address"], ADDRESS_SHAPE_MESSAGE);
        assert_eq!(errors["birthdate"], BIRTHDATE_FORMAT_MESSAGE);
    }

    #[test]
    fn null_required_section_counts_as_missing() {
        let required = SectionSet {
            about_me: true,
            ..Default::default()
        };
        let input = SectionInput {
            about_me: Some(Value::Null),
            ..Default::default()
        };
        let errors = validate_sections(&required, &input).unwrap_err();
        assert_eq!(errors["aboutMe"], "About me is required");
    }

    #[test]
    fn empty_requirement_accepts_anything() {
        let values =
            validate_sections(&SectionSet::default(), &SectionInput::default()).unwrap();
        assert_eq!(values, SectionValues::default());
    }
}
