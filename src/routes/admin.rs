use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::role_auth::RequireRole;
use crate::models::user::{UserProfile, UserRole};
use crate::services::account_service::{self, LoginRequest, RegisterRequest};
use crate::services::trip_service::TripFilter;
use crate::state::AppState;

const ADMIN_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Superadmin];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: u64,
    pub admins: u64,
    pub trips: u64,
    pub shared_trips: u64,
    pub blogs: u64,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/login", web::post().to(login))
            .service(
                web::resource("/register")
                    .wrap(RequireRole::new(UserRole::Superadmin))
                    .wrap(AuthMiddleware)
                    .route(web::post().to(register)),
            )
            .service(
                web::resource("/users")
                    .wrap(RequireRole::new(UserRole::Admin))
                    .wrap(AuthMiddleware)
                    .route(web::get().to(list_users)),
            )
            .service(
                web::resource("/admins")
                    .wrap(RequireRole::new(UserRole::Admin))
                    .wrap(AuthMiddleware)
                    .route(web::get().to(list_admins)),
            )
            .service(
                web::resource("/stats")
                    .wrap(RequireRole::new(UserRole::Admin))
                    .wrap(AuthMiddleware)
                    .route(web::get().to(stats)),
            ),
    );
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let session = account_service::register_admin(
        state.users.as_ref(),
        body.into_inner(),
        state.config.bcrypt_cost,
        state.jwt_secret(),
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Admin registered successfully.",
        "token": session.token,
        "admin": UserProfile::from(&session.user),
    })))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let session =
        account_service::admin_login(state.users.as_ref(), body.into_inner(), state.jwt_secret())
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Admin logged in successfully",
        "token": session.token,
        "admin": UserProfile::from(&session.user),
    })))
}

async fn profiles_with_roles(
    state: &AppState,
    roles: &[UserRole],
) -> Result<Vec<UserProfile>, ApiError> {
    let users = state.users.list_by_roles(roles).await?;
    Ok(users.iter().map(UserProfile::from).collect())
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = profiles_with_roles(&state, &[UserRole::User]).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": users.len(),
        "users": users,
    })))
}

pub async fn list_admins(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let admins = profiles_with_roles(&state, ADMIN_ROLES).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": admins.len(),
        "admins": admins,
    })))
}

pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let shared = TripFilter {
        user_id: None,
        shared: Some(true),
    };
    let all = TripFilter::default();

    let (users, admins, trips, shared_trips, blogs) = tokio::try_join!(
        state.users.count_by_roles(&[UserRole::User]),
        state.users.count_by_roles(ADMIN_ROLES),
        state.trips.count(&all),
        state.trips.count(&shared),
        state.blogs.count(),
    )?;

    let stats = DashboardStats {
        users,
        admins,
        trips,
        shared_trips,
        blogs,
    };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "stats": stats })))
}
