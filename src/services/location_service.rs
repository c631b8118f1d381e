use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    Collection, Database,
};

use crate::db::mongo::{CITIES, COUNTRIES, STATES};
use crate::error::ApiError;
use crate::models::location::{
    CitiesQuery, City, CityFilters, CitySearchQuery, Country, PopularQuery, State,
};

const DEFAULT_CITY_LIMIT: i64 = 50;
const MAX_CITY_LIMIT: i64 = 500;
const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 100;
const MIN_SEARCH_CHARS: usize = 2;

fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.map(|l| l.clamp(1, max)).unwrap_or(default)
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn city_filters(query: &CitiesQuery) -> CityFilters {
    CityFilters {
        limit: clamp_limit(query.limit, DEFAULT_CITY_LIMIT, MAX_CITY_LIMIT),
        major_only: query.major_only.unwrap_or(false),
    }
}

pub fn cities_filter(country_code: &str, state_code: &str, major_only: bool) -> Document {
    let mut filter = doc! {
        "countryCode": country_code,
        "stateCode": state_code,
        "isActive": true,
    };
    if major_only {
        filter.insert(
            "$or",
            vec![doc! { "isMajorCity": true }, doc! { "isCapital": true }],
        );
    }
    filter
}

pub fn cities_sort() -> Document {
    doc! { "isCapital": -1, "isMajorCity": -1, "population": -1, "name": 1 }
}

/// Case-insensitive substring match; the query text is matched literally.
pub fn search_filter(q: &str, country_code: Option<&str>) -> Document {
    let mut filter = doc! {
        "name": { "$regex": regex::escape(q), "$options": "i" },
        "isActive": true,
    };
    if let Some(code) = country_code {
        filter.insert("countryCode", normalize_code(code));
    }
    filter
}

pub fn search_sort() -> Document {
    doc! { "isMajorCity": -1, "population": -1, "name": 1 }
}

pub fn popular_filter(country_code: Option<&str>) -> Document {
    let mut filter = doc! { "isMajorCity": true, "isActive": true };
    if let Some(code) = country_code {
        filter.insert("countryCode", normalize_code(code));
    }
    filter
}

pub struct StatesListing {
    pub country: Country,
    pub states: Vec<State>,
}

pub struct CitiesListing {
    pub state: State,
    pub cities: Vec<City>,
    pub filters: CityFilters,
}

pub struct CitySearch {
    pub query: String,
    pub cities: Vec<City>,
}

/// Read-only access to the country, state and city collections.
/// Codes arrive already normalized; only active records are returned.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Sorted by name.
    async fn countries(&self) -> Result<Vec<Country>, ApiError>;

    async fn country(&self, code: &str) -> Result<Option<Country>, ApiError>;

    /// Sorted by name.
    async fn states(&self, country_code: &str) -> Result<Vec<State>, ApiError>;

    async fn state(&self, country_code: &str, state_code: &str)
        -> Result<Option<State>, ApiError>;

    /// Capitals first, then major cities, then population desc and name.
    async fn cities(
        &self,
        country_code: &str,
        state_code: &str,
        filters: &CityFilters,
    ) -> Result<Vec<City>, ApiError>;

    /// Case-insensitive substring match on the name; major cities and larger populations first.
    async fn search(
        &self,
        q: &str,
        country_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<City>, ApiError>;

    /// Major cities by population desc, then name.
    async fn popular(&self, country_code: Option<&str>, limit: i64) -> Result<Vec<City>, ApiError>;
}

pub struct MongoLocationStore {
    countries: Collection<Country>,
    states: Collection<State>,
    cities: Collection<City>,
}

impl MongoLocationStore {
    pub fn new(db: &Database) -> Self {
        Self {
            countries: db.collection(COUNTRIES),
            states: db.collection(STATES),
            cities: db.collection(CITIES),
        }
    }
}

#[async_trait]
impl LocationStore for MongoLocationStore {
    async fn countries(&self) -> Result<Vec<Country>, ApiError> {
        let cursor = self
            .countries
            .find(doc! { "isActive": true })
            .sort(doc! { "name": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn country(&self, code: &str) -> Result<Option<Country>, ApiError> {
        Ok(self
            .countries
            .find_one(doc! { "code": code, "isActive": true })
            .await?)
    }

    async fn states(&self, country_code: &str) -> Result<Vec<State>, ApiError> {
        let cursor = self
            .states
            .find(doc! { "countryCode": country_code, "isActive": true })
            .sort(doc! { "name": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn state(
        &self,
        country_code: &str,
        state_code: &str,
    ) -> Result<Option<State>, ApiError> {
        Ok(self
            .states
            .find_one(doc! {
                "countryCode": country_code,
                "code": state_code,
                "isActive": true,
            })
            .await?)
    }

    async fn cities(
        &self,
        country_code: &str,
        state_code: &str,
        filters: &CityFilters,
    ) -> Result<Vec<City>, ApiError> {
        let cursor = self
            .cities
            .find(cities_filter(country_code, state_code, filters.major_only))
            .sort(cities_sort())
            .limit(filters.limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn search(
        &self,
        q: &str,
        country_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<City>, ApiError> {
        let cursor = self
            .cities
            .find(search_filter(q, country_code))
            .sort(search_sort())
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn popular(&self, country_code: Option<&str>, limit: i64) -> Result<Vec<City>, ApiError> {
        let cursor = self
            .cities
            .find(popular_filter(country_code))
            .sort(doc! { "population": -1, "name": 1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

fn optional_code(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_code).filter(|c| !c.is_empty())
}

pub async fn list_countries(store: &dyn LocationStore) -> Result<Vec<Country>, ApiError> {
    store.countries().await
}

pub async fn list_states(
    store: &dyn LocationStore,
    country_code: &str,
) -> Result<StatesListing, ApiError> {
    let code = normalize_code(country_code);
    let country = store
        .country(&code)
        .await?
        .ok_or_else(|| ApiError::not_found("Country not found"))?;
    let states = store.states(&code).await?;
    Ok(StatesListing { country, states })
}

pub async fn list_cities(
    store: &dyn LocationStore,
    country_code: &str,
    state_code: &str,
    query: &CitiesQuery,
) -> Result<CitiesListing, ApiError> {
    let country_code = normalize_code(country_code);
    let state_code = normalize_code(state_code);
    let filters = city_filters(query);

    let state = store
        .state(&country_code, &state_code)
        .await?
        .ok_or_else(|| ApiError::not_found("State not found"))?;
    let cities = store.cities(&country_code, &state_code, &filters).await?;

    Ok(CitiesListing {
        state,
        cities,
        filters,
    })
}

pub async fn search_cities(
    store: &dyn LocationStore,
    query: &CitySearchQuery,
) -> Result<CitySearch, ApiError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.chars().count() < MIN_SEARCH_CHARS {
        return Err(ApiError::validation(
            "Search query must be at least 2 characters long",
        ));
    }

    let country_code = optional_code(query.country_code.as_deref());
    let limit = clamp_limit(query.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);
    let cities = store.search(q, country_code.as_deref(), limit).await?;

    Ok(CitySearch {
        query: q.to_string(),
        cities,
    })
}

pub async fn popular_destinations(
    store: &dyn LocationStore,
    query: &PopularQuery,
) -> Result<Vec<City>, ApiError> {
    let country_code = optional_code(query.country_code.as_deref());
    let limit = clamp_limit(query.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);
    store.popular(country_code.as_deref(), limit).await
}
