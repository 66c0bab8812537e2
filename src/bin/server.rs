//! Lokalisointi HTTP server
//!
//! Run with: lokalisointi-server --env-name untuva --slug <export slug>

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lokalisointi::api::ApiServer;
use lokalisointi::integrations::{DisabledImporter, KeyImporter, TolgeeConfig, TolgeeImporter};
use lokalisointi::storage::{MemoryObjectStore, ObjectStore, OverrideStore, Storage};
#[cfg(feature = "cloud")]
use lokalisointi::storage::{S3Config, S3ObjectStore};
use lokalisointi::sync::HttpPeerClient;
use lokalisointi::types::*;
use lokalisointi::LokalisointiService;

#[derive(Parser, Debug)]
#[command(name = "lokalisointi-server")]
#[command(about = "Localisation service with local overrides and environment copying")]
struct Args {
    /// Environment this instance runs in (pallero, untuva, hahtuva, sade)
    #[arg(long, env = "LOKALISOINTI_ENV_NAME")]
    env_name: Environment,

    /// Address to listen on
    #[arg(long, env = "LOKALISOINTI_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Override database path
    #[arg(
        long,
        env = "LOKALISOINTI_DB_PATH",
        default_value = "~/.local/share/lokalisointi/overrides.db"
    )]
    db_path: String,

    /// Bucket holding the translation files; in-memory store when absent
    #[arg(long, env = "LOKALISOINTI_BUCKET")]
    bucket: Option<String>,

    /// Bucket region
    #[arg(long, env = "LOKALISOINTI_REGION")]
    region: Option<String>,

    /// Endpoint of an S3-compatible store
    #[arg(long, env = "LOKALISOINTI_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Export slug of the translation management project
    #[arg(long, env = "LOKALISOINTI_SLUG")]
    slug: String,

    /// Tag of this application's objects
    #[arg(long, env = "LOKALISOINTI_TAG", default_value = DEFAULT_TAG)]
    tag: String,

    /// Listing cache lifetime and eviction period in ms
    #[arg(long, env = "LOKALISOINTI_FIND_CACHE_TTL_MS", default_value = "60000")]
    find_cache_ttl_ms: u64,

    /// Attempts per object store call
    #[arg(long, env = "LOKALISOINTI_RETRY_ATTEMPTS", default_value = "3")]
    retry_attempts: u32,

    /// Delay before the first retry in ms
    #[arg(long, env = "LOKALISOINTI_RETRY_BACKOFF_MS", default_value = "100")]
    retry_backoff_ms: u64,

    /// max-age of public responses in minutes
    #[arg(long, env = "LOKALISOINTI_PUBLIC_CACHE_MAX_AGE_MINUTES", default_value = "5")]
    public_cache_max_age_minutes: u64,

    #[arg(long, env = "LOKALISOINTI_URL_PALLERO")]
    url_pallero: Option<String>,

    #[arg(long, env = "LOKALISOINTI_URL_UNTUVA")]
    url_untuva: Option<String>,

    #[arg(long, env = "LOKALISOINTI_URL_HAHTUVA")]
    url_hahtuva: Option<String>,

    #[arg(long, env = "LOKALISOINTI_URL_SADE")]
    url_sade: Option<String>,

    /// Tolgee base URL; key import is disabled when absent
    #[arg(long, env = "TOLGEE_BASE_URL")]
    tolgee_base_url: Option<String>,

    #[arg(long, env = "TOLGEE_API_KEY", default_value = "none")]
    tolgee_api_key: String,

    #[arg(long, env = "TOLGEE_PROJECT_ID", default_value = "")]
    tolgee_project_id: String,

    /// Log as JSON lines
    #[arg(long, env = "LOKALISOINTI_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }
}

#[cfg(feature = "cloud")]
async fn bucket_store(args: &Args) -> Option<Arc<dyn ObjectStore>> {
    let bucket = args.bucket.as_ref()?;
    let config = S3Config {
        bucket: bucket.clone(),
        region: args.region.clone(),
        endpoint_url: args.endpoint_url.clone(),
    };
    tracing::info!("Using bucket {}", bucket);
    Some(Arc::new(S3ObjectStore::connect(&config).await))
}

#[cfg(not(feature = "cloud"))]
async fn bucket_store(args: &Args) -> Option<Arc<dyn ObjectStore>> {
    if args.bucket.is_some() {
        tracing::warn!(
            "Built without the cloud feature, ignoring bucket (region {:?}, endpoint {:?})",
            args.region,
            args.endpoint_url
        );
    }
    None
}

async fn object_store(args: &Args) -> Arc<dyn ObjectStore> {
    if let Some(store) = bucket_store(args).await {
        return store;
    }
    tracing::warn!("No bucket configured, translations are kept in memory");
    Arc::new(MemoryObjectStore::new())
}

fn key_importer(args: &Args) -> Arc<dyn KeyImporter> {
    match args.tolgee_base_url {
        Some(ref base_url) => Arc::new(TolgeeImporter::new(TolgeeConfig {
            base_url: base_url.clone(),
            api_key: args.tolgee_api_key.clone(),
            project_id: args.tolgee_project_id.clone(),
        })),
        None => Arc::new(DisabledImporter),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let environment_urls = EnvironmentUrls {
        pallero: args.url_pallero.clone(),
        untuva: args.url_untuva.clone(),
        hahtuva: args.url_hahtuva.clone(),
        sade: args.url_sade.clone(),
    };
    let config = ServiceConfig {
        env_name: args.env_name,
        base_store: BaseStoreConfig {
            tag: args.tag.clone(),
            slug: args.slug.clone(),
            find_cache_ttl_ms: args.find_cache_ttl_ms,
            retry_attempts: args.retry_attempts,
            retry_backoff_ms: args.retry_backoff_ms,
        },
        environment_urls: environment_urls.clone(),
        public_cache_max_age_minutes: args.public_cache_max_age_minutes,
    };
    tracing::info!(
        "Starting lokalisointi {} in {} (cache max-age {} min)",
        lokalisointi::VERSION,
        config.env_name,
        config.public_cache_max_age_minutes
    );

    let db_path = shellexpand::tilde(&args.db_path).to_string();
    let storage = Storage::open(&db_path)
        .with_context(|| format!("opening override database {}", db_path))?;

    let peer = HttpPeerClient::new(environment_urls)
        .context("building peer client")?
        .with_caller_id(format!("lokalisointi.{}", config.env_name));

    let service = Arc::new(LokalisointiService::new(
        config,
        object_store(&args).await,
        OverrideStore::new(storage),
        Arc::new(peer),
        key_importer(&args),
    ));

    let eviction = service.start_cache_eviction();

    ApiServer::new(service, args.listen)
        .start(shutdown_signal())
        .await
        .context("serving HTTP")?;

    eviction.stop();
    Ok(())
}
