use async_trait::async_trait;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::user::{normalize_email, User, UserRole, BIO_MAX_CHARS};
use crate::services::http_client;
use crate::services::token_service;
use crate::services::user_store::UserStore;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridEmail {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridPersonalization {
    pub to: Vec<SendGridEmail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridRequest {
    pub personalizations: Vec<SendGridPersonalization>,
    pub from: SendGridEmail,
    pub subject: String,
    pub content: Vec<SendGridContent>,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Mail delivery is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("Request error: {0}")]
    Request(String),
    #[error("API error: {0}")]
    Api(String),
}

impl From<EmailError> for ApiError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::NotConfigured(_) => ApiError::Internal(err.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Delivers mail through a SendGrid-compatible HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: http_client(config.upstream_timeout),
            api_url: config.mail.api_url.clone(),
            api_key: config.mail.api_key.clone(),
            from: config.mail.from.clone(),
        }
    }

    fn request_body(&self, message: &EmailMessage) -> SendGridRequest {
        SendGridRequest {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridEmail {
                    email: message.to.clone(),
                }],
            }],
            from: SendGridEmail {
                email: self.from.clone(),
            },
            subject: message.subject.clone(),
            content: vec![
                SendGridContent {
                    content_type: "text/plain".to_string(),
                    value: message.text.clone(),
                },
                SendGridContent {
                    content_type: "text/html".to_string(),
                    value: message.html.clone(),
                },
            ],
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EmailError::NotConfigured("MAIL_API_KEY not set"))?;

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&self.request_body(message))
            .send()
            .await
            .map_err(|e| EmailError::Request(e.to_string()))?;

        if response.status().is_success() {
            log::info!("Email '{}' sent to {}", message.subject, message.to);
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(EmailError::Api(format!(
                "Mail API returned {}: {}",
                status, error_text
            )))
        }
    }
}

pub fn otp_email(to: &str, name: &str, otp: &str) -> EmailMessage {
    let subject = "Verify your Travique email".to_string();
    let text = format!(
        "Hi {},\n\nYour verification code is: {}\n\nThis code will expire in 10 minutes.\n\nIf you didn't create a Travique account, please ignore this email.\n\nHappy travels,\nThe Travique Team",
        name, otp
    );
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Verify your email</h2>
  <p>Hi {},</p>
  <p>Your verification code is:</p>
  <p style="font-size: 32px; font-weight: bold; letter-spacing: 4px;">{}</p>
  <p>This code will expire in 10 minutes.</p>
  <p>If you didn't create a Travique account, please ignore this email.</p>
</div>"#,
        name, otp
    );
    EmailMessage {
        to: to.to_string(),
        subject,
        text,
        html,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    #[serde(alias = "email")]
    pub email_id: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "phoneno")]
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    #[serde(alias = "email")]
    pub email_id: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpRequest {
    #[serde(alias = "email")]
    pub email_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub email_id: Option<String>,
    pub password: Option<String>,
}

pub struct Registration {
    pub user: User,
    pub email_sent: bool,
}

pub struct Session {
    pub user: User,
    pub token: String,
}

fn field(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Checked registration fields, shared by user and admin sign-up.
struct NewAccount {
    name: String,
    email_id: String,
    password: String,
    phone_number: String,
    city: String,
    state: String,
    country: String,
    bio: Option<String>,
    image: Option<String>,
}

fn validate_registration(req: RegisterRequest) -> Result<NewAccount, ApiError> {
    let (Some(name), Some(email_id), Some(password)) =
        (field(req.name), field(req.email_id), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::validation("Name, email and password are required"));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    if !email_id.contains('@') {
        return Err(ApiError::validation("Valid email is required"));
    }

    let (Some(phone_number), Some(city), Some(state), Some(country)) = (
        field(req.phone_number),
        field(req.city),
        field(req.state),
        field(req.country),
    ) else {
        return Err(ApiError::validation(
            "Phone number, city, state and country are required",
        ));
    };

    let bio = field(req.bio);
    if bio
        .as_ref()
        .map_or(false, |b| b.chars().count() > BIO_MAX_CHARS)
    {
        return Err(ApiError::validation("Bio must be at most 500 characters"));
    }

    Ok(NewAccount {
        name,
        email_id: normalize_email(&email_id),
        password,
        phone_number,
        city,
        state,
        country,
        bio,
        image: field(req.image),
    })
}

fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

fn password_matches(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

async fn ensure_unique(
    users: &dyn UserStore,
    email_id: &str,
    phone_number: &str,
) -> Result<(), ApiError> {
    if let Some(existing) = users.find_by_email(email_id).await? {
        let message = if existing.role.is_admin() {
            "Admin with this email already exists"
        } else {
            "Email already registered"
        };
        return Err(ApiError::Conflict(message.to_string()));
    }
    if users.find_by_phone(phone_number).await?.is_some() {
        return Err(ApiError::Conflict(
            "User with this phone number already exists".to_string(),
        ));
    }
    Ok(())
}

fn new_user(account: NewAccount, password_hash: String, role: UserRole, now: DateTime) -> User {
    User {
        id: None,
        name: account.name,
        email_id: account.email_id,
        password: password_hash,
        role,
        phone_number: account.phone_number,
        city: account.city,
        state: account.state,
        country: account.country,
        bio: account.bio,
        image: account.image,
        is_email_verified: false,
        email_otp_hash: None,
        email_otp_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Creates an unverified user and sends exactly one OTP email. A failed send
/// does not undo the registration; the caller reports it through `email_sent`.
pub async fn register_user(
    users: &dyn UserStore,
    mailer: &dyn Mailer,
    req: RegisterRequest,
    bcrypt_cost: u32,
) -> Result<Registration, ApiError> {
    let account = validate_registration(req)?;
    ensure_unique(users, &account.email_id, &account.phone_number).await?;

    let now = DateTime::now();
    let hash = hash_password(&account.password, bcrypt_cost)?;
    let mut user = new_user(account, hash, UserRole::User, now);
    let otp = user.issue_email_otp(now);
    let user = users.insert(user).await?;

    let email_sent = match mailer
        .send(&otp_email(&user.email_id, &user.name, &otp))
        .await
    {
        Ok(()) => true,
        Err(err) => {
            log::error!("Failed to send OTP email to {}: {}", user.email_id, err);
            false
        }
    };

    log::info!("Registered user {}", user.id_hex());
    Ok(Registration { user, email_sent })
}

pub async fn verify_email(users: &dyn UserStore, req: VerifyEmailRequest) -> Result<User, ApiError> {
    let (Some(email_id), Some(otp)) = (field(req.email_id), field(req.otp)) else {
        return Err(ApiError::validation("Email and OTP are required"));
    };

    let mut user = users
        .find_by_email(&normalize_email(&email_id))
        .await?
        .ok_or(ApiError::InvalidOtp)?;

    let now = DateTime::now();
    if !user.verify_email_otp(&otp, now) {
        return Err(ApiError::InvalidOtp);
    }

    user.mark_email_verified(now);
    users.save_verification_state(&user).await?;
    log::info!("Email verified for user {}", user.id_hex());
    Ok(user)
}

pub async fn resend_otp(
    users: &dyn UserStore,
    mailer: &dyn Mailer,
    req: ResendOtpRequest,
) -> Result<(), ApiError> {
    let email_id = field(req.email_id).ok_or_else(|| ApiError::validation("Email is required"))?;
    let mut user = users
        .find_by_email(&normalize_email(&email_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.is_email_verified {
        return Err(ApiError::validation("Email is already verified"));
    }

    let otp = user.issue_email_otp(DateTime::now());
    users.save_verification_state(&user).await?;
    mailer
        .send(&otp_email(&user.email_id, &user.name, &otp))
        .await?;
    Ok(())
}

pub async fn login(
    users: &dyn UserStore,
    req: LoginRequest,
    jwt_secret: &str,
) -> Result<Session, ApiError> {
    let (Some(email_id), Some(password)) = (field(req.email_id), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let user = users
        .find_by_email(&normalize_email(&email_id))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !password_matches(&password, &user.password) {
        return Err(ApiError::InvalidCredentials);
    }
    if !user.is_email_verified {
        return Err(ApiError::EmailNotVerified);
    }

    let token = token_service::issue_user_token(&user, jwt_secret)?;
    Ok(Session { user, token })
}

/// Admins are created already verified; no OTP is issued.
pub async fn register_admin(
    users: &dyn UserStore,
    req: RegisterRequest,
    bcrypt_cost: u32,
    jwt_secret: &str,
) -> Result<Session, ApiError> {
    let account = validate_registration(req)?;
    ensure_unique(users, &account.email_id, &account.phone_number).await?;

    let now = DateTime::now();
    let hash = hash_password(&account.password, bcrypt_cost)?;
    let mut admin = new_user(account, hash, UserRole::Admin, now);
    admin.is_email_verified = true;
    let admin = users.insert(admin).await?;

    log::info!("Registered admin {}", admin.id_hex());
    let token = token_service::issue_admin_token(&admin, jwt_secret)?;
    Ok(Session { user: admin, token })
}

pub async fn admin_login(
    users: &dyn UserStore,
    req: LoginRequest,
    jwt_secret: &str,
) -> Result<Session, ApiError> {
    let (Some(email_id), Some(password)) = (field(req.email_id), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let admin = users
        .find_by_email(&normalize_email(&email_id))
        .await?
        .filter(|u| u.role.is_admin())
        .ok_or(ApiError::InvalidCredentials)?;

    if !password_matches(&password, &admin.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = token_service::issue_admin_token(&admin, jwt_secret)?;
    Ok(Session { user: admin, token })
}

/// Creates the configured superadmin when no superadmin exists yet.
pub async fn seed_superadmin(users: &dyn UserStore, config: &AppConfig) -> Result<(), ApiError> {
    let (Some(email), Some(password)) = (&config.superadmin_email, &config.superadmin_password)
    else {
        return Ok(());
    };

    if users.count_by_roles(&[UserRole::Superadmin]).await? > 0 {
        return Ok(());
    }

    let now = DateTime::now();
    let account = NewAccount {
        name: "Super Admin".to_string(),
        email_id: normalize_email(email),
        password: password.clone(),
        phone_number: format!("superadmin:{}", normalize_email(email)),
        city: "-".to_string(),
        state: "-".to_string(),
        country: "-".to_string(),
        bio: None,
        image: None,
    };
    let hash = hash_password(&account.password, config.bcrypt_cost)?;
    let mut superadmin = new_user(account, hash, UserRole::Superadmin, now);
    superadmin.is_email_verified = true;

    let superadmin = users.insert(superadmin).await?;
    log::info!("Seeded superadmin {}", superadmin.email_id);
    Ok(())
}
