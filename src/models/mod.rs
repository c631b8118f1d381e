pub mod blog;
pub mod location;
pub mod suggestion;
pub mod trip;
pub mod user;

use mongodb::bson::{oid::ObjectId, DateTime};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Parses a path or body id, reporting malformed values as validation failures.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| ApiError::validation(format!("Invalid {} id", what)))
}

pub fn to_rfc3339(dt: DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| dt.timestamp_millis().to_string())
}

pub fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
