//! Password hashing with bcrypt.
//!
//! The spec pins bcrypt (cost >= 10) explicitly rather than leaving the
//! algorithm to the implementer, so this module uses `bcrypt` rather than
//! the `argon2` crate the rest of the framework this crate descends from
//! would reach for (see DESIGN.md).

use crate::auth::config::PasswordConfig;
use crate::error::Error;

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    min_password_length: usize,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(PasswordConfig::default())
    }
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self {
            cost: config.bcrypt_cost.max(10),
            min_password_length: config.min_password_length,
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, Error> {
        if password.len() < self.min_password_length {
            return Err(Error::validation(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }

        bcrypt::hash(password, self.cost)
            .map_err(|e| Error::Internal(format!("failed to hash password: {e}")))
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, Error> {
        bcrypt::verify(password, hash)
            .map_err(|e| Error::Internal(format!("invalid password hash: {e}")))
    }
}

/// Checks password strength per spec §4.5: >= 8 chars, at least one upper,
/// one lower, one digit, and one special character.
pub fn check_password_strength(password: &str) -> Result<(), Error> {
    if password.len() < 8 {
        return Err(Error::validation_field(
            "password",
            "password must be at least 8 characters",
        ));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(Error::validation_field(
            "password",
            "password must contain an uppercase letter, a lowercase letter, a digit, and a special character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = PasswordHasher::default();
        let hash = hasher.hash("Str0ng!Pass").unwrap();
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("Str0ng!Pass", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn enforces_minimum_cost_of_ten() {
        let hasher = PasswordHasher::new(PasswordConfig {
            bcrypt_cost: 4,
            min_password_length: 8,
        });
        assert_eq!(hasher.cost, 10);
    }

    #[test]
    fn strength_check_rejects_missing_classes() {
        assert!(check_password_strength("alllowercase1!").is_err());
        assert!(check_password_strength("ALLUPPERCASE1!").is_err());
        assert!(check_password_strength("NoDigitsHere!").is_err());
        assert!(check_password_strength("NoSpecial123").is_err());
        assert!(check_password_strength("Valid1Pass!").is_ok());
    }
}
