pub mod admin;
pub mod auth;
pub mod blogs;
pub mod health;
pub mod images;
pub mod location;
pub mod trips;

use actix_web::{error, web, HttpRequest};

use crate::error::ApiError;

/// Malformed JSON bodies surface as validation errors in the usual error shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        log::debug!("Rejected JSON body: {}", err);
        error::Error::from(ApiError::validation(format!("Invalid request body: {}", err)))
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        error::Error::from(ApiError::validation(format!("Invalid query string: {}", err)))
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req: &HttpRequest| {
        error::Error::from(ApiError::validation(format!("Invalid path: {}", err)))
    })
}

/// Registers every route; shared by `main` and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                .route("/test", web::get().to(health::api_test))
                .configure(auth::configure)
                .configure(admin::configure)
                .configure(trips::configure)
                .configure(blogs::configure)
                .configure(location::configure)
                .configure(images::configure),
        );
}
