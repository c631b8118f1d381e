use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    options::ReturnDocument,
    Collection, Database,
};
use serde_json::Value;

use crate::db::mongo::PAST_TRIPS;
use crate::error::ApiError;
use crate::models::sha256_hex;
use crate::models::trip::{
    coerce_budget, coerce_preferences, AllTripsQuery, PastTrip, RefineTripRequest, SaveTripRequest,
    TripPage, TripResponse,
};
use crate::models::suggestion::Section;
use crate::services::itinerary_generation_service::{
    parse_model_json, refine_itinerary, ItineraryGenerator,
};
use crate::services::normalizer::to_sections;

pub const DEDUPE_WINDOW_MILLIS: i64 = 30_000;
pub const USER_HISTORY_LIMIT: i64 = 20;

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;
const DEFAULT_LATEST_LIMIT: i64 = 5;
const MAX_LATEST_LIMIT: i64 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripFilter {
    pub user_id: Option<String>,
    pub shared: Option<bool>,
}

impl TripFilter {
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if let Some(user_id) = &self.user_id {
            filter.insert("userId", user_id.clone());
        }
        if let Some(shared) = self.shared {
            filter.insert("shared", shared);
        }
        filter
    }

    pub fn matches(&self, trip: &PastTrip) -> bool {
        self.user_id.as_ref().map_or(true, |u| *u == trip.user_id)
            && self.shared.map_or(true, |s| s == trip.shared)
    }
}

/// Persistence for past trips. Listings are always newest first.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn insert(&self, trip: PastTrip) -> Result<PastTrip, ApiError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<PastTrip>, ApiError>;

    async fn find_recent_duplicate(
        &self,
        dedupe_key: &str,
        since: DateTime,
    ) -> Result<Option<PastTrip>, ApiError>;

    async fn list(
        &self,
        filter: &TripFilter,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<PastTrip>, ApiError>;

    async fn count(&self, filter: &TripFilter) -> Result<u64, ApiError>;

    async fn delete(&self, id: ObjectId) -> Result<bool, ApiError>;

    async fn set_shared(&self, id: ObjectId, now: DateTime) -> Result<Option<PastTrip>, ApiError>;

    async fn replace_suggestions(
        &self,
        id: ObjectId,
        suggestions: Value,
        now: DateTime,
    ) -> Result<Option<PastTrip>, ApiError>;
}

pub struct MongoTripStore {
    collection: Collection<PastTrip>,
}

impl MongoTripStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(PAST_TRIPS),
        }
    }
}

fn to_bson(value: &Value) -> Result<mongodb::bson::Bson, ApiError> {
    mongodb::bson::to_bson(value)
        .map_err(|e| ApiError::Internal(format!("Failed to encode suggestions: {}", e)))
}

#[async_trait]
impl TripStore for MongoTripStore {
    async fn insert(&self, mut trip: PastTrip) -> Result<PastTrip, ApiError> {
        let result = self.collection.insert_one(&trip).await?;
        trip.id = result.inserted_id.as_object_id();
        Ok(trip)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<PastTrip>, ApiError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_recent_duplicate(
        &self,
        dedupe_key: &str,
        since: DateTime,
    ) -> Result<Option<PastTrip>, ApiError> {
        Ok(self
            .collection
            .find_one(doc! { "dedupeKey": dedupe_key, "createdAt": { "$gte": since } })
            .sort(doc! { "createdAt": -1 })
            .await?)
    }

    async fn list(
        &self,
        filter: &TripFilter,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<PastTrip>, ApiError> {
        let cursor = self
            .collection
            .find(filter.to_document())
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, filter: &TripFilter) -> Result<u64, ApiError> {
        Ok(self.collection.count_documents(filter.to_document()).await?)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, ApiError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn set_shared(&self, id: ObjectId, now: DateTime) -> Result<Option<PastTrip>, ApiError> {
        Ok(self
            .collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "shared": true, "updatedAt": now } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn replace_suggestions(
        &self,
        id: ObjectId,
        suggestions: Value,
        now: DateTime,
    ) -> Result<Option<PastTrip>, ApiError> {
        let suggestions = to_bson(&suggestions)?;
        Ok(self
            .collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "suggestions": suggestions, "updatedAt": now } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; returns the calendar date.
pub fn parse_trip_date(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| ApiError::validation(format!("{} must be a valid date (YYYY-MM-DD)", field)))
}

/// Suggestions sometimes arrive as a JSON document inside a string.
pub fn normalize_suggestions(raw: Value) -> Value {
    match raw {
        Value::String(text) => match parse_model_json(&text) {
            Some(parsed) if parsed.is_object() || parsed.is_array() => parsed,
            _ => Value::String(text),
        },
        other => other,
    }
}

pub fn dedupe_key(
    user_id: &str,
    city: &str,
    check_in: &str,
    check_out: &str,
    preference: &[String],
    budget: f64,
) -> String {
    sha256_hex(&format!(
        "{}|{}|{}|{}|{}|{}",
        user_id,
        city.to_lowercase(),
        check_in,
        check_out,
        preference.join(","),
        budget
    ))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn is_empty_json(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Validates and coerces a save request into a new, unsaved trip.
pub fn build_trip(req: SaveTripRequest, now: DateTime) -> Result<PastTrip, ApiError> {
    let preference = coerce_preferences(req.preference.as_ref());

    let mut missing = Vec::new();
    if is_blank(&req.user_id) {
        missing.push("userId");
    }
    if is_blank(&req.city) {
        missing.push("city");
    }
    if is_blank(&req.check_in) {
        missing.push("checkIn");
    }
    if is_blank(&req.check_out) {
        missing.push("checkOut");
    }
    if preference.is_empty() {
        missing.push("preference");
    }
    if is_empty_json(&req.budget) {
        missing.push("budget");
    }
    if is_empty_json(&req.suggestions) {
        missing.push("suggestions");
    }
    if !missing.is_empty() {
        return Err(ApiError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let budget = coerce_budget(req.budget.as_ref())
        .filter(|b| *b > 0.0)
        .ok_or_else(|| ApiError::validation("budget must be a positive number"))?;

    let check_in = parse_trip_date(req.check_in.as_deref().unwrap_or_default(), "checkIn")?;
    let check_out = parse_trip_date(req.check_out.as_deref().unwrap_or_default(), "checkOut")?;
    if check_out <= check_in {
        return Err(ApiError::validation("checkOut must be after checkIn"));
    }

    let user_id = req.user_id.unwrap_or_default().trim().to_string();
    let city = req.city.unwrap_or_default().trim().to_string();
    let check_in = check_in.format("%Y-%m-%d").to_string();
    let check_out = check_out.format("%Y-%m-%d").to_string();
    let suggestions = normalize_suggestions(req.suggestions.unwrap_or(Value::Null));

    let key = dedupe_key(&user_id, &city, &check_in, &check_out, &preference, budget);

    Ok(PastTrip {
        id: None,
        user_id,
        city,
        check_in,
        check_out,
        preference,
        budget,
        suggestions: Some(to_bson(&suggestions)?),
        shared: false,
        dedupe_key: Some(key),
        created_at: now,
        updated_at: now,
    })
}

/// Returns the stored trip and whether it was newly created. A matching save
/// inside the dedupe window yields the earlier record.
pub async fn save_trip(
    store: &dyn TripStore,
    req: SaveTripRequest,
) -> Result<(PastTrip, bool), ApiError> {
    let now = DateTime::now();
    let trip = build_trip(req, now)?;

    if let Some(key) = trip.dedupe_key.as_deref() {
        let since = DateTime::from_millis(now.timestamp_millis() - DEDUPE_WINDOW_MILLIS);
        if let Some(existing) = store.find_recent_duplicate(key, since).await? {
            log::info!(
                "Duplicate save for user {} to {} suppressed",
                existing.user_id,
                existing.city
            );
            return Ok((existing, false));
        }
    }

    let saved = store.insert(trip).await?;
    log::info!("Saved trip to {} for user {}", saved.city, saved.user_id);
    Ok((saved, true))
}

pub async fn list_trips_for_user(
    store: &dyn TripStore,
    user_id: &str,
) -> Result<Vec<PastTrip>, ApiError> {
    let filter = TripFilter {
        user_id: Some(user_id.to_string()),
        shared: None,
    };
    store.list(&filter, 0, USER_HISTORY_LIMIT).await
}

/// Page defaults to 1 (non-positive becomes 1); limit defaults to 20 and is clamped to 1..=100.
pub fn page_params(page: Option<i64>, limit: Option<i64>) -> (u64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1) as u64;
    let limit = limit
        .map(|l| l.clamp(1, MAX_PAGE_LIMIT))
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    (page, limit)
}

/// Documents to skip before `page`; saturates so huge page numbers yield an empty page.
pub fn page_skip(page: u64, limit: i64) -> u64 {
    (page - 1)
        .saturating_mul(limit as u64)
        .min(i64::MAX as u64)
}

pub fn latest_limit(limit: Option<i64>) -> i64 {
    limit
        .map(|l| l.clamp(1, MAX_LATEST_LIMIT))
        .unwrap_or(DEFAULT_LATEST_LIMIT)
}

pub async fn list_all_trips(
    store: &dyn TripStore,
    query: AllTripsQuery,
) -> Result<TripPage, ApiError> {
    let (page, limit) = page_params(query.page, query.limit);
    let skip = page_skip(page, limit);
    let filter = TripFilter {
        user_id: query.user_id.filter(|u| !u.trim().is_empty()),
        shared: query.shared_only,
    };

    let (trips, total) = tokio::try_join!(
        store.list(&filter, skip, limit),
        store.count(&filter)
    )?;

    Ok(TripPage {
        page,
        limit,
        total,
        trips: trips.iter().map(TripResponse::from).collect(),
    })
}

pub async fn list_latest_trips(
    store: &dyn TripStore,
    limit: Option<i64>,
    shared_only: Option<bool>,
) -> Result<Vec<PastTrip>, ApiError> {
    let filter = TripFilter {
        user_id: None,
        shared: shared_only.unwrap_or(true).then_some(true),
    };
    store.list(&filter, 0, latest_limit(limit)).await
}

pub async fn find_trip(store: &dyn TripStore, id: ObjectId) -> Result<PastTrip, ApiError> {
    store
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))
}

pub async fn delete_trip(store: &dyn TripStore, id: ObjectId) -> Result<(), ApiError> {
    if store.delete(id).await? {
        log::info!("Deleted trip {}", id);
        Ok(())
    } else {
        Err(ApiError::not_found("Trip not found"))
    }
}

pub async fn share_trip(store: &dyn TripStore, id: ObjectId) -> Result<PastTrip, ApiError> {
    store
        .set_shared(id, DateTime::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))
}

/// Sends the stored trip and the user's change request back through the
/// generator and stores whatever comes back, raw text included.
pub async fn refine_trip(
    store: &dyn TripStore,
    generator: &dyn ItineraryGenerator,
    id: ObjectId,
    req: RefineTripRequest,
) -> Result<PastTrip, ApiError> {
    let prompt = req
        .prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("prompt is required"))?;

    let trip = find_trip(store, id).await?;
    let result = refine_itinerary(generator, &trip, &prompt).await?;

    store
        .replace_suggestions(id, result.into_suggestions(), DateTime::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))
}

pub async fn trip_sections(store: &dyn TripStore, id: ObjectId) -> Result<Vec<Section>, ApiError> {
    let trip = find_trip(store, id).await?;
    Ok(to_sections(&trip.suggestions_json()))
}
