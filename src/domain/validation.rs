//! Profile validation pipeline
//!
//! Every rule is a predicate over the whole candidate. All applicable rules
//! run, and their violations are collected in declaration order.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::password;
use super::profiles::{CandidateProfile, Gender, ProfileDetails, Profession, SubscriptionPlan};

pub const USERNAME_MIN_LENGTH: usize = 4;
pub const USERNAME_MAX_LENGTH: usize = 20;

/// A single user-correctable problem with a submitted field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A candidate that passed every rule, with its enum fields resolved.
#[derive(Debug, Clone)]
pub struct ValidatedProfile {
    pub username: String,
    pub password: Option<SecretString>,
    pub details: ProfileDetails,
}

struct FieldRule {
    field: &'static str,
    applies: fn(&CandidateProfile) -> bool,
    check: fn(&CandidateProfile) -> Result<(), &'static str>,
}

const RULES: &[FieldRule] = &[
    FieldRule { field: "username", applies: always, check: username_length },
    FieldRule { field: "username", applies: always, check: username_whitespace },
    FieldRule { field: "password", applies: has_password, check: password_length },
    FieldRule { field: "password", applies: has_password, check: password_charset },
    FieldRule { field: "profession", applies: always, check: profession_known },
    FieldRule { field: "companyName", applies: is_entrepreneur, check: company_present },
    FieldRule { field: "addressLine1", applies: always, check: address_present },
    FieldRule { field: "country", applies: always, check: country_present },
    FieldRule { field: "state", applies: always, check: state_present },
    FieldRule { field: "city", applies: always, check: city_present },
    FieldRule { field: "subscriptionPlan", applies: always, check: plan_known },
    FieldRule { field: "gender", applies: always, check: gender_known },
    FieldRule { field: "customGender", applies: is_other_gender, check: custom_gender_present },
];

/// Run the full pipeline over `candidate`.
pub fn validate(candidate: CandidateProfile) -> Result<ValidatedProfile, Vec<FieldViolation>> {
    let violations: Vec<FieldViolation> = RULES
        .iter()
        .filter(|rule| (rule.applies)(&candidate))
        .filter_map(|rule| {
            (rule.check)(&candidate)
                .err()
                .map(|message| FieldViolation::new(rule.field, message))
        })
        .collect();

    if !violations.is_empty() {
        return Err(violations);
    }

    let (Some(profession), Some(gender), Some(subscription_plan)) = (
        Profession::parse(&candidate.profession),
        Gender::parse(&candidate.gender),
        plan_or_default(&candidate.subscription_plan),
    ) else {
        return Err(vec![FieldViolation::new("profile", "Invalid profile")]);
    };

    let details = ProfileDetails {
        profession,
        company_name: (profession == Profession::Entrepreneur)
            .then(|| candidate.company_name.trim().to_string()),
        address_line1: candidate.address_line1,
        country: candidate.country,
        state: candidate.state,
        city: candidate.city,
        subscription_plan,
        newsletter: candidate.newsletter,
        gender,
        custom_gender: (gender == Gender::Other).then(|| candidate.custom_gender.trim().to_string()),
    };

    Ok(ValidatedProfile {
        username: candidate.username,
        password: candidate.password,
        details,
    })
}

/// Messages for the username format rules, used by the availability check.
pub fn username_violations(username: &str) -> Vec<&'static str> {
    [check_username_length(username), check_username_whitespace(username)]
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

fn always(_: &CandidateProfile) -> bool {
    true
}

fn has_password(c: &CandidateProfile) -> bool {
    c.password.is_some()
}

fn is_entrepreneur(c: &CandidateProfile) -> bool {
    c.profession == Profession::Entrepreneur.as_str()
}

fn is_other_gender(c: &CandidateProfile) -> bool {
    c.gender == Gender::Other.as_str()
}

fn check_username_length(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if (USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&len) {
        Ok(())
    } else {
        Err("Username must be between 4 and 20 characters")
    }
}

fn check_username_whitespace(username: &str) -> Result<(), &'static str> {
    if username.chars().any(char::is_whitespace) {
        Err("Username cannot contain spaces")
    } else {
        Ok(())
    }
}

fn username_length(c: &CandidateProfile) -> Result<(), &'static str> {
    check_username_length(&c.username)
}

fn username_whitespace(c: &CandidateProfile) -> Result<(), &'static str> {
    check_username_whitespace(&c.username)
}

fn password_length(c: &CandidateProfile) -> Result<(), &'static str> {
    match &c.password {
        Some(p) if !password::meets_minimum_length(p.expose_secret()) => {
            Err("Password must be at least 8 characters")
        }
        _ => Ok(()),
    }
}

fn password_charset(c: &CandidateProfile) -> Result<(), &'static str> {
    match &c.password {
        Some(p) if !password::has_digit_and_symbol(p.expose_secret()) => {
            Err("Password must contain at least one number and one special character")
        }
        _ => Ok(()),
    }
}

fn profession_known(c: &CandidateProfile) -> Result<(), &'static str> {
    Profession::parse(&c.profession)
        .map(|_| ())
        .ok_or("Invalid profession selected")
}

fn company_present(c: &CandidateProfile) -> Result<(), &'static str> {
    present(&c.company_name, "Company name is required for entrepreneurs")
}

fn address_present(c: &CandidateProfile) -> Result<(), &'static str> {
    present(&c.address_line1, "Address is required")
}

fn country_present(c: &CandidateProfile) -> Result<(), &'static str> {
    present(&c.country, "Country is required")
}

fn state_present(c: &CandidateProfile) -> Result<(), &'static str> {
    present(&c.state, "State is required")
}

fn city_present(c: &CandidateProfile) -> Result<(), &'static str> {
    present(&c.city, "City is required")
}

fn plan_known(c: &CandidateProfile) -> Result<(), &'static str> {
    plan_or_default(&c.subscription_plan)
        .map(|_| ())
        .ok_or("Invalid subscription plan")
}

fn gender_known(c: &CandidateProfile) -> Result<(), &'static str> {
    Gender::parse(&c.gender).map(|_| ()).ok_or("Invalid gender selected")
}

fn custom_gender_present(c: &CandidateProfile) -> Result<(), &'static str> {
    present(
        &c.custom_gender,
        "Custom gender is required when selecting \"Other\"",
    )
}

fn present(value: &str, message: &'static str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        Err(message)
    } else {
        Ok(())
    }
}

// An omitted plan falls back to Basic.
fn plan_or_default(value: &str) -> Option<SubscriptionPlan> {
    if value.trim().is_empty() {
        Some(SubscriptionPlan::default())
    } else {
        SubscriptionPlan::parse(value)
    }
}
