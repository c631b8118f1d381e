use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::models::location::{CitiesQuery, CitySearchQuery, CodeName, PopularQuery};
use crate::services::location_service;
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/locations")
            .route("/countries", web::get().to(get_countries))
            .route("/countries/{country_code}/states", web::get().to(get_states))
            .route(
                "/countries/{country_code}/states/{state_code}/cities",
                web::get().to(get_cities),
            )
            .route("/cities/search", web::get().to(search_cities))
            .route("/destinations/popular", web::get().to(popular_destinations)),
    );
}

pub async fn get_countries(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let countries = location_service::list_countries(state.locations.as_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": countries.len(),
        "data": countries,
    })))
}

pub async fn get_states(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let listing = location_service::list_states(state.locations.as_ref(), &path).await?;
    let country = CodeName {
        code: listing.country.code,
        name: listing.country.name,
    };
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": listing.states.len(),
        "data": listing.states,
        "country": country,
    })))
}

pub async fn get_cities(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<CitiesQuery>,
) -> Result<HttpResponse, ApiError> {
    let (country_code, state_code) = path.into_inner();
    let listing = location_service::list_cities(
        state.locations.as_ref(),
        &country_code,
        &state_code,
        &query,
    )
    .await?;
    let state_info = CodeName {
        code: listing.state.code,
        name: listing.state.name,
    };
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": listing.cities.len(),
        "data": listing.cities,
        "state": state_info,
        "filters": listing.filters,
    })))
}

pub async fn search_cities(
    state: web::Data<AppState>,
    query: web::Query<CitySearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let search = location_service::search_cities(state.locations.as_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": search.cities.len(),
        "data": search.cities,
        "query": search.query,
    })))
}

pub async fn popular_destinations(
    state: web::Data<AppState>,
    query: web::Query<PopularQuery>,
) -> Result<HttpResponse, ApiError> {
    let cities = location_service::popular_destinations(state.locations.as_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": cities.len(),
        "data": cities,
    })))
}
