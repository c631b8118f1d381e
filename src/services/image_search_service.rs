use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::services::http_client;

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelImageRequest {
    pub hotel_name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealImageRequest {
    pub meal_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: Option<String>,
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Link of the first image result, if any.
    async fn first_image(&self, query: &str) -> Result<Option<String>, ApiError>;
}

pub struct GoogleImageSearch {
    client: reqwest::Client,
    api_key: Option<String>,
    cx: Option<String>,
}

impl GoogleImageSearch {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: http_client(config.upstream_timeout),
            api_key: config.google_api_key.clone(),
            cx: config.google_cx.clone(),
        }
    }
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    async fn first_image(&self, query: &str) -> Result<Option<String>, ApiError> {
        let (Some(key), Some(cx)) = (self.api_key.as_deref(), self.cx.as_deref()) else {
            return Err(ApiError::Internal(
                "GOOGLE_API_KEY and GOOGLE_CX must be set for image search".to_string(),
            ));
        };

        let response = self
            .client
            .get(CUSTOM_SEARCH_URL)
            .query(&[
                ("q", query),
                ("searchType", "image"),
                ("num", "1"),
                ("key", key),
                ("cx", cx),
            ])
            .send()
            .await
            .map_err(|e| ApiError::from_upstream("Image search", e))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Image search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unreadable image search response: {}", e)))?;

        Ok(body.items.into_iter().find_map(|item| item.link))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn hotel_query(req: HotelImageRequest) -> Result<String, ApiError> {
    let hotel = trimmed(req.hotel_name).ok_or_else(|| ApiError::validation("hotelName is required"))?;
    Ok(match trimmed(req.city) {
        Some(city) => format!("{}, {}", hotel, city),
        None => hotel,
    })
}

pub fn meal_query(req: MealImageRequest) -> Result<String, ApiError> {
    trimmed(req.meal_name).ok_or_else(|| ApiError::validation("mealName is required"))
}

pub async fn find_image(search: &dyn ImageSearch, query: &str) -> Result<String, ApiError> {
    search
        .first_image(query)
        .await?
        .ok_or_else(|| ApiError::not_found("Image not found"))
}
