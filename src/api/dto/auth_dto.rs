//! Authentication request bodies.

use serde::Deserialize;
use utoipa::ToSchema;

use super::common_dto::looks_like_email;
use crate::error::GatewayError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Request body for `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    /// Account email.
    pub email: String,
    /// Plain-text password, at least 8 characters.
    pub password: String,
}

impl CredentialsRequest {
    /// Checks email shape and password length.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] naming the offending field.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !looks_like_email(&self.email) {
            return Err(GatewayError::InvalidRequest(
                "email must be a valid address".to_string(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(GatewayError::InvalidRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Request body for `POST /auth/recover`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecoverRequest {
    /// Account email.
    pub email: String,
}

impl RecoverRequest {
    /// Checks email shape.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a malformed email.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !looks_like_email(&self.email) {
            return Err(GatewayError::InvalidRequest(
                "email must be a valid address".to_string(),
            ));
        }
        Ok(())
    }
}
