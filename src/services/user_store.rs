use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    Collection, Database,
};

use crate::db::mongo::USERS;
use crate::error::ApiError;
use crate::models::user::{User, UserRole};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, ApiError>;

    async fn find_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<User>, ApiError>;

    async fn find_by_email(&self, email_id: &str) -> Result<Option<User>, ApiError>;

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, ApiError>;

    /// Fails with `Conflict` when the email or phone is already taken.
    async fn insert(&self, user: User) -> Result<User, ApiError>;

    /// Persists the verification flag and OTP fields only.
    async fn save_verification_state(&self, user: &User) -> Result<(), ApiError>;

    async fn list_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, ApiError>;

    async fn count_by_roles(&self, roles: &[UserRole]) -> Result<u64, ApiError>;
}

pub struct MongoUserStore {
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USERS),
        }
    }
}

fn roles_filter(roles: &[UserRole]) -> Document {
    let roles: Vec<&str> = roles.iter().map(UserRole::as_str).collect();
    doc! { "role": { "$in": roles } }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, ApiError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<User>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_email(&self, email_id: &str) -> Result<Option<User>, ApiError> {
        Ok(self.collection.find_one(doc! { "emailId": email_id }).await?)
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .collection
            .find_one(doc! { "phoneNumber": phone_number })
            .await?)
    }

    async fn insert(&self, mut user: User) -> Result<User, ApiError> {
        match self.collection.insert_one(&user).await {
            Ok(result) => {
                user.id = result.inserted_id.as_object_id();
                Ok(user)
            }
            Err(err) if ApiError::is_duplicate_key(&err) => Err(ApiError::Conflict(
                "Email or phone number already registered".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_verification_state(&self, user: &User) -> Result<(), ApiError> {
        let id = user
            .id
            .ok_or_else(|| ApiError::Internal("User has no id".to_string()))?;
        let otp_hash = user
            .email_otp_hash
            .clone()
            .map(Bson::String)
            .unwrap_or(Bson::Null);
        let otp_expires = user
            .email_otp_expires_at
            .map(Bson::DateTime)
            .unwrap_or(Bson::Null);

        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "isEmailVerified": user.is_email_verified,
                    "emailOtpHash": otp_hash,
                    "emailOtpExpiresAt": otp_expires,
                    "updatedAt": user.updated_at,
                } },
            )
            .await?;
        Ok(())
    }

    async fn list_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, ApiError> {
        let cursor = self
            .collection
            .find(roles_filter(roles))
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_by_roles(&self, roles: &[UserRole]) -> Result<u64, ApiError> {
        Ok(self.collection.count_documents(roles_filter(roles)).await?)
    }
}
