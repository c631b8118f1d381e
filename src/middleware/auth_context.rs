use std::future::{ready, Ready};

use actix_web::{dev::Payload, Error, FromRequest, HttpMessage, HttpRequest};

use crate::error::ApiError;
use crate::models::user::UserRole;
use crate::services::token_service::Claims;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    pub role: UserRole,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<Claims>().and_then(|claims| {
            claims.role().map(|role| AuthenticatedUser {
                user_id: claims.sub.clone(),
                email: claims.email.clone(),
                role,
            })
        });

        ready(user.ok_or_else(|| {
            ApiError::Unauthorized("User not authenticated".to_string()).into()
        }))
    }
}
