use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::role_auth::RequireRole;
use crate::models::parse_object_id;
use crate::models::suggestion::ItineraryResult;
use crate::models::trip::{
    AllTripsQuery, LatestTripsQuery, RefineTripRequest, SaveTripRequest, TripPage, TripResponse,
};
use crate::models::user::UserRole;
use crate::services::event_service::{EventWindow, EventsRequest};
use crate::services::itinerary_generation_service::{
    generate_itinerary, GenerateTripRequest, TripRequest,
};
use crate::services::trip_service;
use crate::state::AppState;

#[derive(Serialize)]
struct GenerateResponse {
    success: bool,
    #[serde(flatten)]
    result: ItineraryResult,
}

#[derive(Serialize)]
struct PageResponse {
    success: bool,
    #[serde(flatten)]
    page: TripPage,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/trips")
            .route("/generate-trip", web::post().to(generate_trip))
            .route("/saveTrip", web::post().to(save_trip))
            .route("/getPastTrips/{user_id}", web::get().to(get_past_trips))
            .route("/deleteTrip/{trip_id}", web::delete().to(delete_trip))
            .route("/shareTrip/{trip_id}", web::put().to(share_trip))
            .route("/updateTrip/{trip_id}", web::put().to(update_trip))
            .route("/latest", web::get().to(latest_trips))
            .route("/predicthq-events", web::post().to(events))
            .service(
                web::resource("/all")
                    .wrap(RequireRole::new(UserRole::Admin))
                    .wrap(AuthMiddleware)
                    .route(web::get().to(all_trips)),
            )
            .route("/{trip_id}/sections", web::get().to(trip_sections)),
    );
}

pub async fn generate_trip(
    state: web::Data<AppState>,
    body: web::Json<GenerateTripRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = TripRequest::try_from(body.into_inner())?;
    let result = generate_itinerary(state.generator.as_ref(), &request).await?;

    if let ItineraryResult::Raw { text } = &result {
        log::warn!(
            "Model reply for {} was not JSON; returning {} chars of raw text",
            request.city,
            text.len()
        );
    }

    Ok(HttpResponse::Ok().json(GenerateResponse {
        success: true,
        result,
    }))
}

pub async fn save_trip(
    state: web::Data<AppState>,
    body: web::Json<SaveTripRequest>,
) -> Result<HttpResponse, ApiError> {
    let (trip, created) = trip_service::save_trip(state.trips.as_ref(), body.into_inner()).await?;

    let mut response = if created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    Ok(response.json(json!({
        "success": true,
        "duplicate": !created,
        "trip": TripResponse::from(&trip),
    })))
}

pub async fn get_past_trips(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    if user_id.trim().is_empty() {
        return Err(ApiError::validation("User ID is required"));
    }

    let trips = trip_service::list_trips_for_user(state.trips.as_ref(), user_id.trim()).await?;
    let trips: Vec<TripResponse> = trips.iter().map(TripResponse::from).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "trips": trips })))
}

pub async fn delete_trip(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "trip")?;
    trip_service::delete_trip(state.trips.as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Trip deleted successfully",
    })))
}

pub async fn share_trip(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "trip")?;
    let trip = trip_service::share_trip(state.trips.as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Trip shared successfully",
        "trip": TripResponse::from(&trip),
    })))
}

pub async fn update_trip(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RefineTripRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "trip")?;
    let trip = trip_service::refine_trip(
        state.trips.as_ref(),
        state.generator.as_ref(),
        id,
        body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "trip": TripResponse::from(&trip),
    })))
}

pub async fn trip_sections(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_object_id(&path, "trip")?;
    let sections = trip_service::trip_sections(state.trips.as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "sections": sections })))
}

pub async fn latest_trips(
    state: web::Data<AppState>,
    query: web::Query<LatestTripsQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let trips =
        trip_service::list_latest_trips(state.trips.as_ref(), query.limit, query.shared_only)
            .await?;
    let trips: Vec<TripResponse> = trips
        .iter()
        .map(|t| TripResponse::from_trip(t, false))
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "trips": trips })))
}

pub async fn all_trips(
    state: web::Data<AppState>,
    query: web::Query<AllTripsQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = trip_service::list_all_trips(state.trips.as_ref(), query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PageResponse {
        success: true,
        page,
    }))
}

pub async fn events(
    state: web::Data<AppState>,
    body: web::Json<EventsRequest>,
) -> Result<HttpResponse, ApiError> {
    let window = EventWindow::try_from(body.into_inner())?;
    let events = state.events.find_events(&window).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "events": events })))
}
