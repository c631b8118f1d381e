use std::time::Duration;

use mongodb::{
    bson::doc,
    options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion},
    Client, Database, IndexModel,
};

pub const USERS: &str = "users";
pub const PAST_TRIPS: &str = "pasttrips";
pub const BLOGS: &str = "blogs";
pub const COUNTRIES: &str = "countries";
pub const STATES: &str = "states";
pub const CITIES: &str = "cities";

pub async fn create_mongo_client(uri: &str) -> Result<Client, mongodb::error::Error> {
    log::info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    let client = Client::with_options(client_options)?;

    // A failed ping is not fatal; the driver reconnects on demand.
    match client.database("admin").run_command(doc! {"ping": 1}).await {
        Ok(_) => log::info!("Connected to MongoDB and verified with ping"),
        Err(e) => log::warn!("Connected to MongoDB but ping failed: {}", e),
    }

    Ok(client)
}

fn unique(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn plain(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    use mongodb::bson::Document;

    db.collection::<Document>(USERS)
        .create_indexes(vec![
            unique(doc! { "emailId": 1 }),
            unique(doc! { "phoneNumber": 1 }),
            plain(doc! { "role": 1 }),
        ])
        .await?;

    db.collection::<Document>(PAST_TRIPS)
        .create_indexes(vec![
            plain(doc! { "userId": 1, "createdAt": -1 }),
            plain(doc! { "dedupeKey": 1, "createdAt": -1 }),
            plain(doc! { "shared": 1, "createdAt": -1 }),
        ])
        .await?;

    db.collection::<Document>(BLOGS)
        .create_index(plain(doc! { "createdAt": -1 }))
        .await?;

    db.collection::<Document>(COUNTRIES)
        .create_index(unique(doc! { "code": 1 }))
        .await?;

    db.collection::<Document>(STATES)
        .create_index(unique(doc! { "countryCode": 1, "code": 1 }))
        .await?;

    db.collection::<Document>(CITIES)
        .create_indexes(vec![
            plain(doc! { "countryCode": 1, "stateCode": 1 }),
            plain(doc! { "name": 1 }),
            plain(doc! { "isMajorCity": 1, "population": -1 }),
        ])
        .await?;

    log::info!("MongoDB indexes ensured");
    Ok(())
}
