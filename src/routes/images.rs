use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::services::image_search_service::{
    find_image, hotel_query, meal_query, HotelImageRequest, MealImageRequest,
};
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .route("/fetchHotelImage", web::post().to(fetch_hotel_image))
            .route("/fetchMealImage", web::post().to(fetch_meal_image)),
    );
}

pub async fn fetch_hotel_image(
    state: web::Data<AppState>,
    body: web::Json<HotelImageRequest>,
) -> Result<HttpResponse, ApiError> {
    let query = hotel_query(body.into_inner())?;
    let image_url = find_image(state.images.as_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "imageUrl": image_url })))
}

pub async fn fetch_meal_image(
    state: web::Data<AppState>,
    body: web::Json<MealImageRequest>,
) -> Result<HttpResponse, ApiError> {
    let query = meal_query(body.into_inner())?;
    let image_url = find_image(state.images.as_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "imageUrl": image_url })))
}
