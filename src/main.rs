//! cookiejar - cookie tally REST service

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cookiejar::{
    config::{Args, PhotoBackend},
    db::MongoClient,
    geocode::GeocodeClient,
    photos::{store::S3Config, FilesystemStore, PhotoStore, S3Store},
    server::{self, AppState},
    tally::TallyService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cookiejar={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("==================================");
    info!("  cookiejar - every cookie counted");
    info!("==================================");
    info!("Listen: {}", args.listen);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Log policy: {:?}", args.log_policy);
    info!("Geocoding: {}", args.geocoding_enabled);
    info!("Photo storage: {:?}", args.photo_storage);
    info!("Photo normalization: {}", args.normalize_photos);
    info!("==================================");

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let geocoder = if args.geocoding_enabled {
        let client = GeocodeClient::new(
            args.geocoder_url.clone(),
            args.geocoder_api_key.clone(),
            Duration::from_millis(args.geocoder_timeout_ms),
        )?;
        info!("Geocoding via {}", args.geocoder_url);
        Some(client)
    } else {
        None
    };

    let mut upload_dir = None;
    let photo_store: Option<Arc<dyn PhotoStore>> = match args.photo_storage {
        PhotoBackend::None => None,
        PhotoBackend::Local => {
            let store = FilesystemStore::new(&args.upload_dir).await?;
            upload_dir = Some(store.dir().clone());
            Some(Arc::new(store))
        }
        PhotoBackend::S3 => {
            let store = S3Store::new(S3Config {
                // validate() guarantees the bucket is set for this backend
                bucket: args.s3_bucket.clone().unwrap_or_default(),
                region: args.s3_region.clone(),
                endpoint: args.s3_endpoint.clone(),
                public_url: args.s3_public_url.clone(),
                access_key: args.s3_access_key.clone(),
                secret_key: args.s3_secret_key.clone(),
            })
            .await?;
            Some(Arc::new(store))
        }
    };

    let tally = TallyService::new(
        mongo,
        geocoder,
        photo_store,
        args.normalize_photos,
        args.log_policy,
    )
    .await?;

    let state = Arc::new(AppState::new(args, tally, upload_dir));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
