//! Profile domain types
//!
//! The persisted profile record, the enumerated field values it carries and
//! the request/response DTOs built around it.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Profession enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Profession {
    Student,
    Developer,
    Entrepreneur,
}

impl Profession {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Student" => Some(Self::Student),
            "Developer" => Some(Self::Developer),
            "Entrepreneur" => Some(Self::Entrepreneur),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Developer => "Developer",
            Self::Entrepreneur => "Entrepreneur",
        }
    }
}

/// Subscription plan enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SubscriptionPlan {
    #[default]
    Basic,
    Pro,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Basic" => Some(Self::Basic),
            "Pro" => Some(Self::Pro),
            "Enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Pro => "Pro",
            Self::Enterprise => "Enterprise",
        }
    }
}

/// Gender enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Other" => Some(Self::Other),
            "Prefer not to say" => Some(Self::PreferNotToSay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
            Self::PreferNotToSay => "Prefer not to say",
        }
    }
}

/// Validated, typed profile fields shared by registration and update.
///
/// `company_name` is only ever `Some` for entrepreneurs and `custom_gender`
/// only for `Gender::Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDetails {
    pub profession: Profession,
    pub company_name: Option<String>,
    pub address_line1: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub subscription_plan: SubscriptionPlan,
    pub newsletter: bool,
    pub gender: Gender,
    pub custom_gender: Option<String>,
}

/// Profile entity as persisted
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub username: String,
    pub credential_hash: SecretString,
    pub details: ProfileDetails,
    pub profile_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw, untyped profile fields as submitted by a client.
///
/// Every value stays a string until the validation pipeline has accepted the
/// whole candidate, so that bad enum values surface as field violations.
#[derive(Debug, Clone, Default)]
pub struct CandidateProfile {
    pub username: String,
    pub password: Option<SecretString>,
    pub profession: String,
    pub company_name: String,
    pub address_line1: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub subscription_plan: String,
    pub newsletter: bool,
    pub gender: String,
    pub custom_gender: String,
}

impl CandidateProfile {
    /// Build a registration candidate from submitted form fields.
    pub fn from_fields(mut fields: FormFields) -> Self {
        Self {
            username: fields.take("username").unwrap_or_default(),
            password: Some(SecretString::new(fields.take("password").unwrap_or_default())),
            profession: fields.take("profession").unwrap_or_default(),
            company_name: fields.take("companyName").unwrap_or_default(),
            address_line1: fields.take("addressLine1").unwrap_or_default(),
            country: fields.take("country").unwrap_or_default(),
            state: fields.take("state").unwrap_or_default(),
            city: fields.take("city").unwrap_or_default(),
            subscription_plan: fields.take("subscriptionPlan").unwrap_or_default(),
            newsletter: fields.take("newsletter").is_some_and(|v| parse_flag(&v)),
            gender: fields.take("gender").unwrap_or_default(),
            custom_gender: fields.take("customGender").unwrap_or_default(),
        }
    }

    /// Rebuild a candidate from a stored record, used to re-validate updates.
    pub fn from_record(record: &ProfileRecord) -> Self {
        let d = &record.details;
        Self {
            username: record.username.clone(),
            password: None,
            profession: d.profession.as_str().to_string(),
            company_name: d.company_name.clone().unwrap_or_default(),
            address_line1: d.address_line1.clone(),
            country: d.country.clone(),
            state: d.state.clone(),
            city: d.city.clone(),
            subscription_plan: d.subscription_plan.as_str().to_string(),
            newsletter: d.newsletter,
            gender: d.gender.as_str().to_string(),
            custom_gender: d.custom_gender.clone().unwrap_or_default(),
        }
    }
}

/// Explicit partial update. Only the fields listed here can be changed through
/// the generic merge path; username, credential and photo are handled elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub profession: Option<String>,
    pub company_name: Option<String>,
    pub address_line1: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub subscription_plan: Option<String>,
    pub newsletter: Option<bool>,
    pub gender: Option<String>,
    pub custom_gender: Option<String>,
}

impl ProfilePatch {
    pub fn from_fields(fields: &mut FormFields) -> Self {
        Self {
            profession: fields.take("profession"),
            company_name: fields.take("companyName"),
            address_line1: fields.take("addressLine1"),
            country: fields.take("country"),
            state: fields.take("state"),
            city: fields.take("city"),
            subscription_plan: fields.take("subscriptionPlan"),
            newsletter: fields.take("newsletter").map(|v| parse_flag(&v)),
            gender: fields.take("gender"),
            custom_gender: fields.take("customGender"),
        }
    }

    /// Merge this patch over `candidate`, field by field.
    pub fn apply_to(self, candidate: &mut CandidateProfile) {
        fn merge(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        merge(&mut candidate.profession, self.profession);
        merge(&mut candidate.company_name, self.company_name);
        merge(&mut candidate.address_line1, self.address_line1);
        merge(&mut candidate.country, self.country);
        merge(&mut candidate.state, self.state);
        merge(&mut candidate.city, self.city);
        merge(&mut candidate.subscription_plan, self.subscription_plan);
        merge(&mut candidate.gender, self.gender);
        merge(&mut candidate.custom_gender, self.custom_gender);
        if let Some(newsletter) = self.newsletter {
            candidate.newsletter = newsletter;
        }
    }
}

/// Requested password change on update
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current_password: SecretString,
    pub new_password: SecretString,
}

impl PasswordChange {
    /// A change is requested whenever a non-empty `newPassword` is present.
    pub fn from_fields(fields: &mut FormFields) -> Option<Self> {
        let new_password = fields.take("newPassword").filter(|p| !p.is_empty())?;
        let current_password = fields.take("currentPassword").unwrap_or_default();
        Some(Self {
            current_password: SecretString::new(current_password),
            new_password: SecretString::new(new_password),
        })
    }
}

/// Text fields of a submitted form, keyed by their wire name.
#[derive(Debug, Clone, Default)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1")
}

/// Response DTO for profile, credential material stripped
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub profession: Profession,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub address_line1: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub subscription_plan: SubscriptionPlan,
    pub newsletter: bool,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_gender: Option<String>,
    pub profile_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRecord> for ProfileResponse {
    fn from(p: ProfileRecord) -> Self {
        let d = p.details;
        Self {
            id: p.id,
            username: p.username,
            profession: d.profession,
            company_name: d.company_name,
            address_line1: d.address_line1,
            country: d.country,
            state: d.state,
            city: d.city,
            subscription_plan: d.subscription_plan,
            newsletter: d.newsletter,
            gender: d.gender,
            custom_gender: d.custom_gender,
            profile_photo: p.profile_photo,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Envelope returned by register and update
#[derive(Debug, Serialize)]
pub struct ProfileEnvelope {
    pub message: String,
    pub user: ProfileResponse,
}

impl ProfileEnvelope {
    pub fn new(message: impl Into<String>, record: ProfileRecord) -> Self {
        Self {
            message: message.into(),
            user: record.into(),
        }
    }
}

/// Request DTO for the standalone password check
#[derive(Debug, Clone, Deserialize)]
pub struct CheckPasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// Request DTO for verifying a user's current password
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPasswordRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub current_password: String,
}

/// Response DTO for username availability
#[derive(Debug, Clone, Serialize)]
pub struct UsernameAvailability {
    pub available: bool,
    pub message: String,
}
