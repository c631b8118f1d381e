use actix_web::{web, HttpResponse};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::UserProfile;
use crate::services::account_service::{
    self, LoginRequest, RegisterRequest, ResendOtpRequest, VerifyEmailRequest,
};
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/verify-email", web::post().to(verify_email))
            .route("/resend-otp", web::post().to(resend_otp))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .service(
                web::resource("/profile")
                    .wrap(AuthMiddleware)
                    .route(web::get().to(profile)),
            ),
    );
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let registration = account_service::register_user(
        state.users.as_ref(),
        state.mailer.as_ref(),
        body.into_inner(),
        state.config.bcrypt_cost,
    )
    .await?;

    let message = if registration.email_sent {
        "User registered successfully. Please check your email for the verification code."
    } else {
        "User registered, but the verification email could not be sent. Please request a new code."
    };

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": message,
        "userId": registration.user.id_hex(),
        "user": UserProfile::from(&registration.user),
        "emailSent": registration.email_sent,
    })))
}

pub async fn verify_email(
    state: web::Data<AppState>,
    body: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = account_service::verify_email(state.users.as_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Email verified successfully",
        "user": UserProfile::from(&user),
    })))
}

pub async fn resend_otp(
    state: web::Data<AppState>,
    body: web::Json<ResendOtpRequest>,
) -> Result<HttpResponse, ApiError> {
    account_service::resend_otp(state.users.as_ref(), state.mailer.as_ref(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "A new verification code has been sent",
    })))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let session =
        account_service::login(state.users.as_ref(), body.into_inner(), state.jwt_secret())
            .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged In Successfully",
        "user": UserProfile::from(&session.user),
        "token": session.token,
    })))
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
}

pub async fn profile(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let id = ObjectId::parse_str(&auth.user_id)
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": UserProfile::from(&user),
    })))
}
