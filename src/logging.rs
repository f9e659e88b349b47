//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set. Otherwise the filter depends on the environment:
//! this crate and request traces are verbose outside prod, and sqlx statement
//! logging stays at warn so every profile lookup does not print its query.

use crate::config::{Environment, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

fn default_filter(env: &Environment) -> String {
    let (crate_level, http_level, fallback) = match env {
        Environment::Dev => ("debug", "debug", "info"),
        Environment::Staging => ("debug", "info", "info"),
        Environment::Prod => ("info", "info", "warn"),
    };
    format!("{CRATE_TARGET}={crate_level},tower_http={http_level},sqlx=warn,{fallback}")
}

pub fn init_logging(settings: &Settings) {
    let env = &settings.env;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // JSON lines in prod for the log shipper, readable output elsewhere
    if matches!(env, Environment::Prod) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    let profile_store = if settings.database_url.is_some() {
        "postgres"
    } else {
        "memory"
    };
    tracing::info!(
        env = ?env,
        profile_store,
        upload_dir = %settings.upload_dir.display(),
        "Logging initialized"
    );
}
