//! Quillcast Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quillcast_engine::api;
use quillcast_engine::app::{App, AppSettings};
use quillcast_engine::infrastructure::{
    auth::StaticTokenVerifier,
    clock::SystemClock,
    config::EngineConfig,
    generation_client::OpenAiStreamClient,
    memory_store::InMemoryContentRepo,
    platforms::configured_adapters,
    ports::{ClockPort, ContentRepo},
    sqlite_store::SqliteContentRepo,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may run from `crates/engine`).
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quillcast_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quillcast Engine");

    let config = EngineConfig::from_env();
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    let repo: Arc<dyn ContentRepo> = match &config.content_db {
        Some(path) => {
            tracing::info!(path = %path, "Using SQLite content store");
            Arc::new(SqliteContentRepo::new(path).await?)
        }
        None => {
            tracing::warn!("CONTENT_DB not set, content records are kept in memory");
            Arc::new(InMemoryContentRepo::new())
        }
    };

    if config.generation.api_key.is_none() {
        tracing::warn!("GENERATION_API_KEY not set, generation requests will be rejected upstream");
    }
    tracing::info!(
        base_url = %config.generation.base_url,
        model = %config.generation.model,
        "Generation backend configured"
    );
    let generator = Arc::new(OpenAiStreamClient::new(&config.generation));

    let adapters = configured_adapters(&config.platforms, config.publish.adapter_timeout);
    tracing::info!(
        count = adapters.len(),
        max_attempts = config.publish.max_attempts,
        base_delay_ms = config.publish.base_delay_ms,
        "Publishing adapters configured"
    );

    let auth = Arc::new(StaticTokenVerifier::from_pairs(
        config.auth_tokens.as_deref().unwrap_or_default(),
    ));

    let app = Arc::new(App::new(
        repo,
        generator,
        adapters,
        auth,
        clock,
        AppSettings::from(&config),
    ));

    tracing::info!(
        interval_secs = config.scheduler_interval.as_secs(),
        "Starting scheduler sweep"
    );
    tokio::spawn(app.use_cases.sweep.clone().run(config.scheduler_interval));

    let mut router = api::router()
        .with_state(app)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer(config.server.cors_allowed_origins.as_deref()) {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer(allowed_origins: Option<&str>) -> Option<CorsLayer> {
    let allowed_origins = allowed_origins.map(str::trim).filter(|s| !s.is_empty())?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if allowed_origins == "*" {
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        return None;
    }
    Some(cors.allow_origin(origins))
}
