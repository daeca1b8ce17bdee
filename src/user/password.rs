//! Password hashing and verification.
//!
//! bcrypt work runs on the blocking pool so request tasks never stall on it.

use std::borrow::Cow;
use tracing::{instrument, warn};
use validator::ValidationError;

use crate::shared::AppError;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    #[instrument(skip_all)]
    pub async fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| {
                warn!(error = %e, "Password hashing task failed");
                AppError::Internal
            })?
            .map_err(|e| {
                warn!(error = %e, "Password hashing failed");
                AppError::Internal
            })
    }

    /// Constant-time comparison is done inside bcrypt. A malformed stored hash
    /// counts as a mismatch.
    #[instrument(skip_all)]
    pub async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AppError> {
        let plaintext = plaintext.to_string();
        let hash = hash.to_string();

        let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .map_err(|e| {
                warn!(error = %e, "Password verification task failed");
                AppError::Internal
            })?;

        Ok(outcome.unwrap_or_else(|e| {
            warn!(error = %e, "Stored password hash could not be parsed");
            false
        }))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

/// Requires at least one letter and one digit; length is checked separately.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_letter && has_digit {
        Ok(())
    } else {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(Cow::from(
            "Password must contain at least one letter and one number",
        ));
        Err(error)
    }
}
