#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;

use mongodb::{Client, Database};
use rocket::fs::{FileServer, Options};
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::data::category::CategoryDbExt;
use crate::data::course::db::CourseDbExt;
use crate::data::user::db::UserDbExt;
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;
use crate::security::Security;

pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;

/// Uploads are served after API routes but before the browser app fallback.
const UPLOADS_RANK: isize = 5;

fn load_config() -> Result<Config, ConfigurationError> {
    tracing::info!("Loading configuration...");
    match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            Ok(c)
        }
        Err(ConfigurationError::NotFound(dir)) => {
            tracing::info!(
                "No configuration in '{}', using defaults.",
                dir.display()
            );
            let c = Config::default();
            if let Err(e) = c.save() {
                tracing::warn!("Unable to save generated configuration: {}", e);
            }
            Ok(c)
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            Err(other)
        }
    }
}

async fn connect(c: &Config) -> Result<Database, BackendError> {
    tracing::info!("Connecting to MongoDB: {}", c.mongodb_uri);
    let client = Client::with_uri_str(c.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.mongodb_db);
    let db = client.database(c.mongodb_db.as_str());

    if let Err(e) = db.list_collection_names(None).await {
        tracing::error!("Unable to connect to MongoDB.");
        return Err(e.into());
    }

    tracing::info!("Ensuring indexes...");
    db.ensure_user_indexes().await?;
    db.ensure_course_indexes().await?;
    db.ensure_category_indexes().await?;

    Ok(db)
}

fn cors_options(c: &Config) -> CorsOptions {
    let allowed_origins = if c.cors_origins.is_empty() {
        AllowedOrigins::All
    } else {
        AllowedOrigins::some_exact(&c.cors_origins)
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
}

/// Sets up logging, configuration, signing keys and the database, then
/// builds the server.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    let c = load_config()?;

    tracing::info!("Initializing security information...");
    let security = Security::load(&c)?;

    let db = connect(&c).await?;

    std::fs::create_dir_all(&c.upload_dir)?;

    build(c, security, db)
}

/// Assembles the server from already loaded parts.
pub fn build(
    config: Config,
    security: Security,
    db: Database,
) -> Result<Rocket<Build>, BackendError> {
    // Room for the multipart framing around the largest accepted file.
    let form_limit = config.max_upload_bytes + 1024 * 1024;
    let figment = rocket::Config::figment()
        .merge(("limits.file", form_limit))
        .merge(("limits.data-form", form_limit));

    tracing::info!("Setting up CORS...");
    let cors = cors_options(&config).to_cors()?;

    let uploads = FileServer::new(&config.upload_dir, Options::Missing).rank(UPLOADS_RANK);

    let r = rocket::custom(figment)
        .manage(config)
        .manage(security)
        .manage(db)
        .attach(cors)
        .mount("/uploads", uploads);

    Ok(mount_api(r))
}
