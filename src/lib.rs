pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::StorageConfig;
use crate::services::blob::BlobMirror;
use crate::services::storage::StorageBackend;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_report,
        api::handlers::upload::upload_media,
        api::handlers::files::serve_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::StoredFile,
            models::UploadKind,
            models::UploadResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "files", description = "Report and media upload and retrieval"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StorageConfig>,
    pub storage: Arc<dyn StorageBackend>,
    pub mirror: Arc<dyn BlobMirror>,
    pub upload_service: Arc<UploadService>,
}

impl AppState {
    pub fn new(
        config: StorageConfig,
        storage: Arc<dyn StorageBackend>,
        mirror: Arc<dyn BlobMirror>,
    ) -> Self {
        let config = Arc::new(config);
        let upload_service = Arc::new(UploadService::new(
            storage.clone(),
            mirror.clone(),
            config.clone(),
        ));
        Self {
            config,
            storage,
            mirror,
            upload_service,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Add 1MB buffer for multipart overhead
    let upload_limit = state.config.max_file_size + 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/reports/upload",
            post(api::handlers::upload::upload_report)
                .layer(axum::extract::DefaultBodyLimit::max(upload_limit))
                .route_layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/api/media/upload",
            post(api::handlers::upload::upload_media)
                .layer(axum::extract::DefaultBodyLimit::max(upload_limit))
                .route_layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/api/storage/*path",
            get(api::handlers::files::serve_file).route_layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .layer(from_fn(api::middleware::security::security_headers))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
        .with_state(state)
}
