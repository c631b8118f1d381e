use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use travique_api::config::AppConfig;
use travique_api::db::mongo::{create_mongo_client, ensure_indexes};
use travique_api::routes;
use travique_api::services::account_service::seed_superadmin;
use travique_api::state::AppState;

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.is_empty() {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));
    log::info!("Application starting...");

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let client = create_mongo_client(&config.mongo_uri)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let db = client.database(&config.database_name);

    if let Err(e) = ensure_indexes(&db).await {
        log::warn!("Failed to ensure MongoDB indexes: {}", e);
    }

    let (host, port) = (config.host.clone(), config.port);
    let state = AppState::new(config, db);

    if let Err(e) = seed_superadmin(state.users.as_ref(), &state.config).await {
        log::warn!("Superadmin seeding failed: {}", e);
    }

    log::info!(
        "Starting HTTP server on {}:{} with {} generator",
        host,
        port,
        state.generator.provider_name()
    );

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&data.config.cors_origins))
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
