use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::to_rfc3339;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastTrip {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub city: String,
    pub check_in: String,
    pub check_out: String,
    pub preference: Vec<String>,
    pub budget: f64,
    /// Stored as BSON; any JSON shape the model produced.
    #[serde(default)]
    pub suggestions: Option<mongodb::bson::Bson>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl PastTrip {
    pub fn suggestions_json(&self) -> Value {
        self.suggestions
            .clone()
            .map(|b| b.into_relaxed_extjson())
            .unwrap_or(Value::Null)
    }
}

/// Body of `POST /api/trips/saveTrip`. Loose on purpose: preference and
/// budget arrive in several shapes and are coerced by the trip service.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTripRequest {
    pub user_id: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "checkin")]
    pub check_in: Option<String>,
    #[serde(alias = "checkout")]
    pub check_out: Option<String>,
    #[serde(alias = "preferences")]
    pub preference: Option<Value>,
    pub budget: Option<Value>,
    pub suggestions: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RefineTripRequest {
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestTripsQuery {
    pub limit: Option<i64>,
    pub shared_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTripsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub shared_only: Option<bool>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub city: String,
    pub check_in: String,
    pub check_out: String,
    pub preference: Vec<String>,
    pub budget: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Value>,
    pub shared: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TripResponse {
    pub fn from_trip(trip: &PastTrip, with_suggestions: bool) -> Self {
        TripResponse {
            id: trip.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: trip.user_id.clone(),
            city: trip.city.clone(),
            check_in: trip.check_in.clone(),
            check_out: trip.check_out.clone(),
            preference: trip.preference.clone(),
            budget: trip.budget,
            suggestions: with_suggestions.then(|| trip.suggestions_json()),
            shared: trip.shared,
            created_at: to_rfc3339(trip.created_at),
            updated_at: to_rfc3339(trip.updated_at),
        }
    }
}

impl From<&PastTrip> for TripResponse {
    fn from(trip: &PastTrip) -> Self {
        TripResponse::from_trip(trip, true)
    }
}

#[derive(Debug, Serialize)]
pub struct TripPage {
    pub page: u64,
    pub limit: i64,
    pub total: u64,
    pub trips: Vec<TripResponse>,
}

/// A bare string becomes a one-element list; blank entries are dropped.
pub fn coerce_preferences(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        }
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Accepts a JSON number or a numeric string. `None` when absent or not numeric.
pub fn coerce_budget(raw: Option<&Value>) -> Option<f64> {
    match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|b| b.is_finite())
}
