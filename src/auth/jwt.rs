use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims carried by the bearer token of an authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub fn validate_access_token(
    token: &str,
    secret: &str,
    issuer: Option<&str>,
) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    if let Some(iss) = issuer {
        validation.set_issuer(&[iss]);
    }

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("rejected access token: {e}");
        AppError::Unauthorized
    })?;

    Ok(data.claims)
}
