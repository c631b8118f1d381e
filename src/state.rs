use std::sync::Arc;

use mongodb::Database;

use crate::config::AppConfig;
use crate::services::account_service::{HttpMailer, Mailer};
use crate::services::blog_service::{BlogStore, MongoBlogStore};
use crate::services::event_service::{EventLookup, PredictHqEvents};
use crate::services::image_search_service::{GoogleImageSearch, ImageSearch};
use crate::services::itinerary_generation_service::{build_generator, ItineraryGenerator};
use crate::services::location_service::{LocationStore, MongoLocationStore};
use crate::services::trip_service::{MongoTripStore, TripStore};
use crate::services::user_store::{MongoUserStore, UserStore};

/// Shared by every worker through `web::Data`; nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub users: Arc<dyn UserStore>,
    pub trips: Arc<dyn TripStore>,
    pub blogs: Arc<dyn BlogStore>,
    pub locations: Arc<dyn LocationStore>,
    pub mailer: Arc<dyn Mailer>,
    pub generator: Arc<dyn ItineraryGenerator>,
    pub events: Arc<dyn EventLookup>,
    pub images: Arc<dyn ImageSearch>,
}

impl AppState {
    /// Production wiring: Mongo-backed stores and HTTP integrations.
    pub fn new(config: AppConfig, db: Database) -> Self {
        let config = Arc::new(config);
        AppState {
            users: Arc::new(MongoUserStore::new(&db)),
            trips: Arc::new(MongoTripStore::new(&db)),
            blogs: Arc::new(MongoBlogStore::new(&db)),
            locations: Arc::new(MongoLocationStore::new(&db)),
            mailer: Arc::new(HttpMailer::new(&config)),
            generator: build_generator(&config),
            events: Arc::new(PredictHqEvents::new(&config)),
            images: Arc::new(GoogleImageSearch::new(&config)),
            config,
            db,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}
