#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use actix_web::{web, App};
use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;

use travique_api::config::AppConfig;
use travique_api::error::ApiError;
use travique_api::models::blog::Blog;
use travique_api::models::location::{City, CityFilters, Continent, Country, State, StateKind};
use travique_api::models::trip::PastTrip;
use travique_api::models::user::{User, UserRole};
use travique_api::routes;
use travique_api::services::account_service::{EmailError, EmailMessage, Mailer};
use travique_api::services::blog_service::BlogStore;
use travique_api::services::event_service::{Event, EventLookup, EventWindow, Venue};
use travique_api::services::image_search_service::ImageSearch;
use travique_api::services::itinerary_generation_service::ItineraryGenerator;
use travique_api::services::location_service::LocationStore;
use travique_api::services::token_service;
use travique_api::services::trip_service::{TripFilter, TripStore};
use travique_api::services::user_store::UserStore;
use travique_api::state::AppState;

pub const JAIPUR_REPLY: &str = r#"Here is your plan:
```json
{
  "hotels": [{ "name": "Hotel Pearl Palace", "price": "₹3,000", "rating": 4.5 }],
  "meals": [{ "name": "Laxmi Misthan Bhandar", "famousDish": "Pyaaz Kachori" }],
  "itinerary": [
    { "day": 1, "date": "2025-03-01", "activities": [
      { "time": "09:00", "description": "Visit Amber Fort", "place": "Amer", "minTransportCost": 200 }
    ] }
  ],
  "estimatedTotal": { "hotel": 6000, "food": 2000, "total": 9000 },
  "packingList": ["Sunscreen", "Walking shoes"]
}
```"#;

#[derive(Default)]
pub struct MemoryTripStore {
    trips: Mutex<Vec<PastTrip>>,
}

impl MemoryTripStore {
    fn newest_first(&self, filter: &TripFilter) -> Vec<PastTrip> {
        let trips = self.trips.lock().unwrap();
        let mut matching: Vec<PastTrip> =
            trips.iter().rev().filter(|t| filter.matches(t)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn insert(&self, mut trip: PastTrip) -> Result<PastTrip, ApiError> {
        trip.id = Some(ObjectId::new());
        self.trips.lock().unwrap().push(trip.clone());
        Ok(trip)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<PastTrip>, ApiError> {
        Ok(self
            .trips
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == Some(id))
            .cloned())
    }

    async fn find_recent_duplicate(
        &self,
        dedupe_key: &str,
        since: DateTime,
    ) -> Result<Option<PastTrip>, ApiError> {
        Ok(self
            .newest_first(&TripFilter::default())
            .into_iter()
            .find(|t| t.dedupe_key.as_deref() == Some(dedupe_key) && t.created_at >= since))
    }

    async fn list(
        &self,
        filter: &TripFilter,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<PastTrip>, ApiError> {
        Ok(self
            .newest_first(filter)
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self, filter: &TripFilter) -> Result<u64, ApiError> {
        Ok(self.newest_first(filter).len() as u64)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, ApiError> {
        let mut trips = self.trips.lock().unwrap();
        let before = trips.len();
        trips.retain(|t| t.id != Some(id));
        Ok(trips.len() < before)
    }

    async fn set_shared(&self, id: ObjectId, now: DateTime) -> Result<Option<PastTrip>, ApiError> {
        let mut trips = self.trips.lock().unwrap();
        Ok(trips.iter_mut().find(|t| t.id == Some(id)).map(|t| {
            t.shared = true;
            t.updated_at = now;
            t.clone()
        }))
    }

    async fn replace_suggestions(
        &self,
        id: ObjectId,
        suggestions: Value,
        now: DateTime,
    ) -> Result<Option<PastTrip>, ApiError> {
        let bson = mongodb::bson::to_bson(&suggestions)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let mut trips = self.trips.lock().unwrap();
        Ok(trips.iter_mut().find(|t| t.id == Some(id)).map(|t| {
            t.suggestions = Some(bson);
            t.updated_at = now;
            t.clone()
        }))
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, ApiError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == Some(id)).cloned())
    }

    async fn find_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.id.map_or(false, |id| ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email_id: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email_id == email_id)
            .cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn insert(&self, mut user: User) -> Result<User, ApiError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.email_id == user.email_id || u.phone_number == user.phone_number)
        {
            return Err(ApiError::Conflict(
                "Email or phone number already registered".to_string(),
            ));
        }
        user.id = Some(ObjectId::new());
        users.push(user.clone());
        Ok(user)
    }

    async fn save_verification_state(&self, user: &User) -> Result<(), ApiError> {
        let mut users = self.users.lock().unwrap();
        if let Some(stored) = users.iter_mut().find(|u| u.id == user.id) {
            stored.is_email_verified = user.is_email_verified;
            stored.email_otp_hash = user.email_otp_hash.clone();
            stored.email_otp_expires_at = user.email_otp_expires_at;
            stored.updated_at = user.updated_at;
        }
        Ok(())
    }

    async fn list_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|u| roles.contains(&u.role))
            .cloned()
            .collect())
    }

    async fn count_by_roles(&self, roles: &[UserRole]) -> Result<u64, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| roles.contains(&u.role))
            .count() as u64)
    }
}

#[derive(Default)]
pub struct MemoryBlogStore {
    blogs: Mutex<Vec<Blog>>,
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn insert(&self, mut blog: Blog) -> Result<Blog, ApiError> {
        blog.id = Some(ObjectId::new());
        self.blogs.lock().unwrap().push(blog.clone());
        Ok(blog)
    }

    async fn list(&self) -> Result<Vec<Blog>, ApiError> {
        Ok(self.blogs.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Blog>, ApiError> {
        Ok(self.blogs.lock().unwrap().iter().find(|b| b.id == Some(id)).cloned())
    }

    async fn replace(&self, blog: &Blog) -> Result<Option<Blog>, ApiError> {
        let mut blogs = self.blogs.lock().unwrap();
        Ok(blogs.iter_mut().find(|b| b.id == blog.id).map(|stored| {
            *stored = blog.clone();
            stored.clone()
        }))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, ApiError> {
        let mut blogs = self.blogs.lock().unwrap();
        let before = blogs.len();
        blogs.retain(|b| b.id != Some(id));
        Ok(blogs.len() < before)
    }

    async fn count(&self) -> Result<u64, ApiError> {
        Ok(self.blogs.lock().unwrap().len() as u64)
    }
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// The 6-digit code from the most recent message.
    pub fn last_otp(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let text = &sent.last()?.text;
        text.split(|c: char| !c.is_ascii_digit())
            .find(|part| part.len() == 6)
            .map(str::to_string)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Api("mail service down".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct StubGenerator {
    pub reply: Result<String, String>,
}

#[async_trait]
impl ItineraryGenerator for StubGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String, ApiError> {
        self.reply.clone().map_err(ApiError::Upstream)
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

pub struct StubEvents;

#[async_trait]
impl EventLookup for StubEvents {
    async fn find_events(&self, window: &EventWindow) -> Result<Vec<Event>, ApiError> {
        if window.city == "Atlantis" {
            return Err(ApiError::not_found("City not found by geocoder"));
        }
        Ok(vec![Event {
            id: "evt-1".to_string(),
            name: "Jaipur Literature Festival".to_string(),
            description: String::new(),
            start: Some(window.start.clone()),
            end: None,
            category: Some("festivals".to_string()),
            venue: Venue {
                name: "Hotel Clarks Amer".to_string(),
                address: "TBD".to_string(),
            },
            phq_attendance: Some(5000),
            url: None,
            city_display: format!("{}, India", window.city),
        }])
    }
}

pub struct StubImages;

#[async_trait]
impl ImageSearch for StubImages {
    async fn first_image(&self, query: &str) -> Result<Option<String>, ApiError> {
        if query.contains("Nowhere") {
            return Ok(None);
        }
        Ok(Some(format!(
            "https://images.example.com/{}.jpg",
            query.replace(' ', "_")
        )))
    }
}

/// US/California fixture plus an inactive country and an inactive state.
pub struct MemoryLocationStore {
    countries: Vec<Country>,
    states: Vec<State>,
    cities: Vec<City>,
}

fn country(code: &str, name: &str, continent: Continent, is_active: bool) -> Country {
    Country {
        code: code.to_string(),
        name: name.to_string(),
        continent,
        currency: None,
        language: None,
        population: None,
        is_active,
    }
}

fn state(country_code: &str, code: &str, name: &str, is_active: bool) -> State {
    State {
        code: code.to_string(),
        name: name.to_string(),
        country_code: country_code.to_string(),
        kind: StateKind::State,
        capital: None,
        population: None,
        is_active,
    }
}

fn city(state_code: &str, name: &str, population: f64, is_capital: bool, is_major_city: bool) -> City {
    City {
        name: name.to_string(),
        state_code: state_code.to_string(),
        country_code: "US".to_string(),
        latitude: None,
        longitude: None,
        population: Some(population),
        elevation: None,
        timezone: None,
        is_capital,
        is_major_city,
        is_active: true,
    }
}

fn by_population_then_name(a: &City, b: &City) -> Ordering {
    let pa = a.population.unwrap_or(0.0);
    let pb = b.population.unwrap_or(0.0);
    pb.partial_cmp(&pa)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

impl Default for MemoryLocationStore {
    fn default() -> Self {
        Self {
            countries: vec![
                country("US", "United States", Continent::NorthAmerica, true),
                country("IN", "India", Continent::Asia, true),
                country("XX", "Retired Republic", Continent::Europe, false),
            ],
            states: vec![
                state("US", "CA", "California", true),
                state("US", "AZ", "Arizona", true),
                state("US", "ZZ", "Old Territory", false),
                state("IN", "RJ", "Rajasthan", true),
            ],
            cities: vec![
                city("CA", "Berkeley", 120_000.0, false, false),
                city("CA", "Fresno", 540_000.0, false, false),
                city("CA", "Los Angeles", 3_900_000.0, false, true),
                city("CA", "Oakland", 430_000.0, false, true),
                city("CA", "Sacramento", 520_000.0, true, false),
                city("CA", "San Diego", 1_400_000.0, false, true),
                city("CA", "San Francisco", 810_000.0, false, true),
                city("CA", "San Jose", 1_000_000.0, false, true),
                city("AZ", "Phoenix", 1_600_000.0, true, true),
                City {
                    is_active: false,
                    ..city("CA", "Sand City", 300.0, false, true)
                },
            ],
        }
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn countries(&self) -> Result<Vec<Country>, ApiError> {
        let mut countries: Vec<Country> =
            self.countries.iter().filter(|c| c.is_active).cloned().collect();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    async fn country(&self, code: &str) -> Result<Option<Country>, ApiError> {
        Ok(self
            .countries
            .iter()
            .find(|c| c.code == code && c.is_active)
            .cloned())
    }

    async fn states(&self, country_code: &str) -> Result<Vec<State>, ApiError> {
        let mut states: Vec<State> = self
            .states
            .iter()
            .filter(|s| s.country_code == country_code && s.is_active)
            .cloned()
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(states)
    }

    async fn state(
        &self,
        country_code: &str,
        state_code: &str,
    ) -> Result<Option<State>, ApiError> {
        Ok(self
            .states
            .iter()
            .find(|s| s.country_code == country_code && s.code == state_code && s.is_active)
            .cloned())
    }

    async fn cities(
        &self,
        country_code: &str,
        state_code: &str,
        filters: &CityFilters,
    ) -> Result<Vec<City>, ApiError> {
        let mut cities: Vec<City> = self
            .cities
            .iter()
            .filter(|c| c.country_code == country_code && c.state_code == state_code && c.is_active)
            .filter(|c| !filters.major_only || c.is_capital || c.is_major_city)
            .cloned()
            .collect();
        cities.sort_by(|a, b| {
            b.is_capital
                .cmp(&a.is_capital)
                .then_with(|| b.is_major_city.cmp(&a.is_major_city))
                .then_with(|| by_population_then_name(a, b))
        });
        cities.truncate(filters.limit as usize);
        Ok(cities)
    }

    async fn search(
        &self,
        q: &str,
        country_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<City>, ApiError> {
        let needle = q.to_lowercase();
        let mut cities: Vec<City> = self
            .cities
            .iter()
            .filter(|c| c.is_active && c.name.to_lowercase().contains(&needle))
            .filter(|c| country_code.map_or(true, |code| c.country_code == code))
            .cloned()
            .collect();
        cities.sort_by(|a, b| {
            b.is_major_city
                .cmp(&a.is_major_city)
                .then_with(|| by_population_then_name(a, b))
        });
        cities.truncate(limit as usize);
        Ok(cities)
    }

    async fn popular(&self, country_code: Option<&str>, limit: i64) -> Result<Vec<City>, ApiError> {
        let mut cities: Vec<City> = self
            .cities
            .iter()
            .filter(|c| c.is_active && c.is_major_city)
            .filter(|c| country_code.map_or(true, |code| c.country_code == code))
            .cloned()
            .collect();
        cities.sort_by(by_population_then_name);
        cities.truncate(limit as usize);
        Ok(cities)
    }
}

pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub trips: Arc<MemoryTripStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(Ok(JAIPUR_REPLY.to_string()), RecordingMailer::default()).await
    }

    pub async fn with_reply(reply: Result<String, String>) -> Self {
        Self::with(reply, RecordingMailer::default()).await
    }

    pub async fn with_mailer(mailer: RecordingMailer) -> Self {
        Self::with(Ok(JAIPUR_REPLY.to_string()), mailer).await
    }

    async fn with(reply: Result<String, String>, mailer: RecordingMailer) -> Self {
        let config = AppConfig::for_tests();
        // The driver connects lazily; nothing here touches the network.
        let client = mongodb::Client::with_uri_str(&config.mongo_uri)
            .await
            .expect("mongo uri should parse");
        let db = client.database(&config.database_name);

        let users = Arc::new(MemoryUserStore::default());
        let trips = Arc::new(MemoryTripStore::default());
        let mailer = Arc::new(mailer);

        let state = AppState {
            config: Arc::new(config),
            locations: Arc::new(MemoryLocationStore::default()),
            db,
            users: users.clone(),
            trips: trips.clone(),
            blogs: Arc::new(MemoryBlogStore::default()),
            mailer: mailer.clone(),
            generator: Arc::new(StubGenerator { reply }),
            events: Arc::new(StubEvents),
            images: Arc::new(StubImages),
        };

        Self {
            state,
            users,
            trips,
            mailer,
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.state.clone()))
            .configure(routes::configure)
    }

    /// Inserts a verified account directly and returns a token for it.
    pub async fn token_for(&self, role: UserRole) -> String {
        let now = DateTime::now();
        let n = self.users.count_by_roles(&[UserRole::User, UserRole::Admin, UserRole::Superadmin]).await.unwrap();
        let user = User {
            id: None,
            name: format!("{:?} {}", role, n),
            email_id: format!("{}{}@travique.test", role.as_str(), n),
            password: bcrypt::hash("password1", 4).unwrap(),
            role,
            phone_number: format!("90000000{:02}", n),
            city: "Jaipur".to_string(),
            state: "Rajasthan".to_string(),
            country: "India".to_string(),
            bio: None,
            image: None,
            is_email_verified: true,
            email_otp_hash: None,
            email_otp_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        let user = self.users.insert(user).await.unwrap();
        let secret = &self.state.config.jwt_secret;
        if role.is_admin() {
            token_service::issue_admin_token(&user, secret).unwrap()
        } else {
            token_service::issue_user_token(&user, secret).unwrap()
        }
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn registration(email: &str, phone: &str) -> Value {
    serde_json::json!({
        "name": "Asha Verma",
        "emailId": email,
        "password": "secret123",
        "phoneNumber": phone,
        "city": "Jaipur",
        "state": "Rajasthan",
        "country": "India"
    })
}

pub fn trip_body(user_id: &str) -> Value {
    serde_json::json!({
        "userId": user_id,
        "city": "Jaipur",
        "checkIn": "2025-03-01",
        "checkOut": "2025-03-05",
        "preference": "culture",
        "budget": "25000",
        "suggestions": { "hotels": [{ "name": "Hotel Pearl Palace" }] }
    })
}
