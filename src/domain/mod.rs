//! Domain types and rules
//!
//! Profile data, the validation pipeline and the password policy.

pub mod password;
pub mod profiles;
pub mod validation;

pub use profiles::*;
pub use validation::FieldViolation;
