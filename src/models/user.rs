use mongodb::bson::{oid::ObjectId, DateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{sha256_hex, to_rfc3339};

pub const OTP_TTL_MILLIS: i64 = 10 * 60 * 1000;
pub const BIO_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
    Superadmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Superadmin => "superadmin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            "superadmin" => Some(UserRole::Superadmin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Superadmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email_id: String,
    /// bcrypt hash, never the plain password
    pub password: String,
    pub role: UserRole,
    pub phone_number: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub email_otp_hash: Option<String>,
    #[serde(default)]
    pub email_otp_expires_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn hash_otp(otp: &str) -> String {
    sha256_hex(otp)
}

impl User {
    /// Generates a fresh 6-digit OTP, storing only its digest and expiry.
    pub fn issue_email_otp(&mut self, now: DateTime) -> String {
        let otp = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        self.email_otp_hash = Some(hash_otp(&otp));
        self.email_otp_expires_at =
            Some(DateTime::from_millis(now.timestamp_millis() + OTP_TTL_MILLIS));
        self.updated_at = now;
        otp
    }

    pub fn verify_email_otp(&self, otp: &str, now: DateTime) -> bool {
        match (&self.email_otp_hash, self.email_otp_expires_at) {
            (Some(hash), Some(expires_at)) => {
                *hash == hash_otp(otp.trim())
                    && now.timestamp_millis() < expires_at.timestamp_millis()
            }
            _ => false,
        }
    }

    pub fn mark_email_verified(&mut self, now: DateTime) {
        self.is_email_verified = true;
        self.email_otp_hash = None;
        self.email_otp_expires_at = None;
        self.updated_at = now;
    }

    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

/// What the API returns for a user; no password or OTP material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email_id: String,
    pub role: UserRole,
    pub phone_number: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub is_email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id_hex(),
            name: user.name.clone(),
            email_id: user.email_id.clone(),
            role: user.role,
            phone_number: user.phone_number.clone(),
            city: user.city.clone(),
            state: user.state.clone(),
            country: user.country.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
            is_email_verified: user.is_email_verified,
            created_at: to_rfc3339(user.created_at),
            updated_at: to_rfc3339(user.updated_at),
        }
    }
}
