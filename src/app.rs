use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Settings;
use crate::middleware::{request_id::X_REQUEST_ID, request_id_layer};
use crate::repository::ProfileRepository;
use crate::routes;
use crate::services::{CredentialStore, FileStore, ProfileUpdateService, RegistrationService};

/// Room for the text fields and multipart framing around the photo.
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub profiles: Arc<dyn ProfileRepository>,
    pub files: FileStore,
    pub registration: RegistrationService,
    pub updates: ProfileUpdateService,
}

impl AppState {
    pub fn new(
        settings: Settings,
        profiles: Arc<dyn ProfileRepository>,
        files: FileStore,
        credentials: CredentialStore,
    ) -> Arc<Self> {
        let registration =
            RegistrationService::new(credentials.clone(), files.clone(), profiles.clone());
        let updates = ProfileUpdateService::new(credentials, files.clone(), profiles.clone());

        Arc::new(Self {
            settings,
            profiles,
            files,
            registration,
            updates,
        })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(&state.settings);

    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    // Request ID layers
    let (set_request_id, propagate_request_id) = request_id_layer();

    let body_limit = DefaultBodyLimit::max(form_body_limit(state.settings.upload_max_bytes));
    let uploads = ServeDir::new(state.files.root());

    Router::new()
        .merge(routes::api_router())
        .nest_service(&state.settings.upload_public_path, uploads)
        // Middleware stack (applied bottom-up)
        .layer(body_limit)
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

/// Request body cap for profile forms: the photo limit plus text fields.
fn form_body_limit(upload_max_bytes: usize) -> usize {
    upload_max_bytes.saturating_add(FORM_OVERHEAD_BYTES)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // In dev mode, use longer preflight cache to reduce OPTIONS requests
    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static(X_REQUEST_ID),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
