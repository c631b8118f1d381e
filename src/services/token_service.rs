use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::user::{User, UserRole};

pub const USER_TOKEN_HOURS: i64 = 24;
pub const ADMIN_TOKEN_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// user id (hex)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn role(&self) -> Option<UserRole> {
        UserRole::parse(&self.role)
    }
}

fn issue(claims: &Claims, secret: &str) -> Result<String, ApiError> {
    let header = Header::new(Algorithm::HS256);
    encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
}

fn claims_for(user: &User, email: Option<String>, ttl: Duration) -> Claims {
    let now = Utc::now();
    Claims {
        sub: user.id_hex(),
        email,
        role: user.role.as_str().to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    }
}

/// 24 hour token carrying id, email and role.
pub fn issue_user_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let claims = claims_for(
        user,
        Some(user.email_id.clone()),
        Duration::hours(USER_TOKEN_HOURS),
    );
    issue(&claims, secret)
}

/// 7 day token carrying id and role only.
pub fn issue_admin_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let claims = claims_for(user, None, Duration::days(ADMIN_TOKEN_DAYS));
    issue(&claims, secret)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| {
        log::debug!("Rejected token: {:?}", err);
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })
}
