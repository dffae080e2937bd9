//! Symptom Storyteller binary entrypoint.
//! Loads configuration and startup artifacts, then boots the Axum HTTP server.

use shuttle_axum::ShuttleAxum;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use symptom_storyteller::api::{create_router, AppState};
use symptom_storyteller::config::AppConfig;
use symptom_storyteller::metrics::Metrics;
use symptom_storyteller::pipeline::InferenceContext;

/// Compact logs by default; STORYTELLER_LOG_JSON=1 switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("symptom_storyteller=info,warn"));

    let json = std::env::var("STORYTELLER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    // Shuttle may already own the global subscriber; that is fine.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(target: "startup", error = ?e, "invalid config, falling back to defaults");
            AppConfig::defaults()
        }
    };

    // Tables and classifier are loaded exactly once, before any request.
    let ctx = InferenceContext::from_config(&cfg);
    let primary_available = ctx.primary.is_available();

    let mut router = create_router(AppState::new(ctx));
    match Metrics::init(primary_available) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => warn!(target: "startup", error = ?e, "metrics recorder not installed"),
    }

    Ok(router.into())
}
