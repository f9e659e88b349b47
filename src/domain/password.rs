//! Password policy and strength scoring

use serde::Serialize;

pub const MIN_PASSWORD_LENGTH: usize = 8;
const STRONG_LENGTH: usize = 12;

/// Symbols that satisfy the "special character" requirement.
pub const PASSWORD_SYMBOLS: &[char] = &['!', '@', '#', '$', '%', '^', '&', '*'];

pub fn meets_minimum_length(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

pub fn has_digit_and_symbol(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_digit()) && password.contains(PASSWORD_SYMBOLS)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

impl PasswordStrength {
    fn from_score(score: u8) -> Self {
        match score {
            6.. => Self::Strong,
            4..=5 => Self::Medium,
            _ => Self::Weak,
        }
    }
}

/// One point per length threshold reached and per character class present.
pub fn strength_score(password: &str) -> u8 {
    let length = password.chars().count();
    let checks = [
        length >= MIN_PASSWORD_LENGTH,
        length >= STRONG_LENGTH,
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    checks.into_iter().filter(|passed| *passed).count() as u8
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordAssessment {
    pub valid: bool,
    pub strength: PasswordStrength,
    pub score: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

pub fn assess(password: &str) -> PasswordAssessment {
    let errors = policy_violations(password)
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let score = strength_score(password);

    PasswordAssessment {
        valid: errors.is_empty(),
        strength: PasswordStrength::from_score(score),
        score,
        errors,
    }
}

/// Messages for every policy rule the password breaks.
pub fn policy_violations(password: &str) -> Vec<&'static str> {
    let mut violations = Vec::new();
    if !meets_minimum_length(password) {
        violations.push("Password must be at least 8 characters");
    }
    if !has_digit_and_symbol(password) {
        violations.push("Password must contain at least one number and one special character");
    }
    violations
}
