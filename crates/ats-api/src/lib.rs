//! # ats-api
//!
//! HTTP surface for the applicant tracking system: candidate CRUD, CV
//! download, health, and the OpenAPI document.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod state;

pub use config::{RateLimitConfig, ServerConfig};
pub use error::ApiError;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::{Config, SwaggerUi};

use handlers::{candidates, system};
use middleware::{cors_layer, rate_limit_middleware, with_security_headers, MakeRequestUuidV7};

/// Base path of the candidate resource.
pub const CANDIDATES_PATH: &str = "/api/v1/candidates";

/// Build the full application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let routes = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health_check))
        // OpenAPI / Swagger UI
        .merge(
            SwaggerUi::new("/docs").config(
                Config::new(["/openapi.yaml"])
                    .try_it_out_enabled(true)
                    .filter(true)
                    .display_request_duration(true),
            ),
        )
        .route("/openapi.yaml", get(system::openapi_yaml))
        // Candidates
        .route(
            CANDIDATES_PATH,
            get(candidates::list_candidates).post(candidates::create_candidate),
        )
        .route(
            "/api/v1/candidates/detail",
            post(candidates::candidate_detail),
        )
        .route(
            "/api/v1/candidates/download-cv",
            post(candidates::download_cv_by_body),
        )
        .route(
            "/api/v1/candidates/:document",
            get(candidates::get_candidate)
                .put(candidates::update_candidate)
                .delete(candidates::delete_candidate),
        )
        .route(
            "/api/v1/candidates/:document/cv",
            get(candidates::download_cv),
        )
        .fallback(system::route_not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(&config.allowed_origins))
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    with_security_headers(routes).with_state(state)
}
