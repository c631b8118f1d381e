use actix_web::{web, HttpResponse, Responder};
use mongodb::bson::doc;
use serde::Serialize;
use std::collections::HashMap;
use std::env;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let mongo_result = check_mongodb(&state).await;
    let llm_result = check_llm(&state);

    if mongo_result.status != "ok" || llm_result.status != "ok" {
        health.status = "degraded".to_string();
    }
    health.services.insert("mongodb".to_string(), mongo_result);
    health.services.insert("llm".to_string(), llm_result);

    HttpResponse::Ok().json(health)
}

pub async fn api_test() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "message": "API is working" }))
}

async fn check_mongodb(state: &AppState) -> ServiceStatus {
    match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => ServiceStatus {
            status: "ok".to_string(),
            details: Some("Connected successfully to MongoDB".to_string()),
        },
        Err(e) => {
            log::error!("MongoDB health check failed: {}", e);
            ServiceStatus {
                status: "error".to_string(),
                details: Some(format!("Failed to connect: {}", e)),
            }
        }
    }
}

/// Configuration check only; no request is sent to the provider.
fn check_llm(state: &AppState) -> ServiceStatus {
    let config = &state.config;
    let configured = match config.llm_provider {
        crate::config::LlmProvider::Vertex => {
            config.vertex.project_id.is_some() && config.vertex.access_token.is_some()
        }
        crate::config::LlmProvider::OpenRouter => config.openrouter.api_key.is_some(),
    };

    ServiceStatus {
        status: if configured { "ok" } else { "error" }.to_string(),
        details: Some(format!(
            "Provider {}{}",
            state.generator.provider_name(),
            if configured { "" } else { " is missing credentials" }
        )),
    }
}
