use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::services::http_client;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const PREDICTHQ_EVENTS_URL: &str = "https://api.predicthq.com/v1/events";
const USER_AGENT: &str = "travique-api/0.1 (+https://travique.app)";
const SEARCH_RADIUS: &str = "50km";
const EVENT_LIMIT: u32 = 20;
const UNKNOWN_VENUE: &str = "TBD";

#[derive(Debug, Deserialize)]
pub struct EventsRequest {
    pub city: Option<String>,
    #[serde(alias = "checkIn")]
    pub checkin: Option<String>,
    #[serde(alias = "checkOut")]
    pub checkout: Option<String>,
}

/// A validated lookup: where, and the UTC instants bounding event start times.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWindow {
    pub city: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub category: Option<String>,
    pub venue: Venue,
    pub phq_attendance: Option<u64>,
    pub url: Option<String>,
    pub city_display: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct PhqResponse {
    #[serde(default)]
    results: Vec<PhqEvent>,
}

#[derive(Debug, Deserialize)]
struct PhqEntity {
    name: Option<String>,
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhqEvent {
    id: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
    category: Option<String>,
    #[serde(default)]
    entities: Vec<PhqEntity>,
    phq_attendance: Option<u64>,
    url: Option<String>,
}

fn to_utc_instant(raw: &str, field: &str) -> Result<String, ApiError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight
                .and_utc()
                .to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        })
        .map_err(|_| ApiError::validation(format!("{} is not a valid date", field)))
}

impl TryFrom<EventsRequest> for EventWindow {
    type Error = ApiError;

    fn try_from(req: EventsRequest) -> Result<Self, Self::Error> {
        let (Some(city), Some(checkin), Some(checkout)) = (
            req.city.filter(|c| !c.trim().is_empty()),
            req.checkin.filter(|c| !c.trim().is_empty()),
            req.checkout.filter(|c| !c.trim().is_empty()),
        ) else {
            return Err(ApiError::validation("city, checkin and checkout are required"));
        };

        Ok(EventWindow {
            city: city.trim().to_string(),
            start: to_utc_instant(&checkin, "checkin")?,
            end: to_utc_instant(&checkout, "checkout")?,
        })
    }
}

fn to_event(raw: PhqEvent, city_display: &str) -> Event {
    let venue = raw.entities.into_iter().next();
    let (venue_name, venue_address) = venue
        .map(|v| (v.name, v.formatted_address))
        .unwrap_or((None, None));

    Event {
        id: raw.id,
        name: raw.title,
        description: raw.description.unwrap_or_default(),
        start: raw.start,
        end: raw.end,
        category: raw.category,
        venue: Venue {
            name: venue_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_VENUE.to_string()),
            address: venue_address
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| UNKNOWN_VENUE.to_string()),
        },
        phq_attendance: raw.phq_attendance,
        url: raw.url.filter(|u| !u.is_empty()),
        city_display: city_display.to_string(),
    }
}

#[async_trait]
pub trait EventLookup: Send + Sync {
    async fn find_events(&self, window: &EventWindow) -> Result<Vec<Event>, ApiError>;
}

/// Geocodes through Nominatim, then asks PredictHQ for events near that point.
pub struct PredictHqEvents {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl PredictHqEvents {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: http_client(config.upstream_timeout),
            api_key: config.predicthq_api_key.clone(),
        }
    }

    async fn geocode(&self, city: &str) -> Result<NominatimPlace, ApiError> {
        let response = self
            .client
            .get(NOMINATIM_URL)
            .query(&[("format", "json"), ("q", city), ("limit", "1")])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| ApiError::from_upstream("Geocoder", e))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Geocoder returned {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unreadable geocoder response: {}", e)))?;

        places
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found("City not found by geocoder"))
    }
}

#[async_trait]
impl EventLookup for PredictHqEvents {
    async fn find_events(&self, window: &EventWindow) -> Result<Vec<Event>, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Internal("PredictHQ key missing".to_string()))?;

        let place = self.geocode(&window.city).await?;
        let within = format!("{}@{},{}", SEARCH_RADIUS, place.lat, place.lon);
        let limit = EVENT_LIMIT.to_string();

        let response = self
            .client
            .get(PREDICTHQ_EVENTS_URL)
            .query(&[
                ("within", within.as_str()),
                ("start.gte", window.start.as_str()),
                ("start.lte", window.end.as_str()),
                ("limit", limit.as_str()),
                ("utc_offset", "local"),
            ])
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::from_upstream("PredictHQ", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("PredictHQ returned {}: {}", status, body);
            return Err(ApiError::Upstream(format!("PredictHQ returned {}", status)));
        }

        let body: PhqResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unreadable PredictHQ response: {}", e)))?;

        log::info!(
            "PredictHQ returned {} events near {}",
            body.results.len(),
            place.display_name
        );
        Ok(body
            .results
            .into_iter()
            .map(|e| to_event(e, &place.display_name))
            .collect())
    }
}
