pub mod account_service;
pub mod blog_service;
pub mod event_service;
pub mod image_search_service;
pub mod itinerary_generation_service;
pub mod location_service;
pub mod normalizer;
pub mod token_service;
pub mod trip_service;
pub mod user_store;

use std::time::Duration;

/// One client per outbound integration, with the request timeout applied.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
