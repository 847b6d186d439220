//! Request-level middleware: request IDs, rate limiting, CORS and security
//! response headers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{
    HeaderName, ACCEPT, AUTHORIZATION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY,
    STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Issues a UUIDv7 `x-request-id` for every request that lacks one.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Peer address of the connection. Requests served without connect info
/// (in-process tests) share the unspecified address.
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Reject requests once the calling client has spent its budget.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(limiter) = &state.rate_limiter {
        let ip = client_ip(&request);
        if limiter.check_key(&ip).is_err() {
            tracing::warn!(
                subsystem = "api",
                component = "rate_limit",
                client = %ip,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            return Err(ApiError::RateLimited);
        }
    }
    Ok(next.run(request).await)
}

/// CORS restricted to an explicit origin list. Never a wildcard.
pub fn cors_layer(allowed_origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins.iter().cloned()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Content security policy applied to every response.
pub const CONTENT_SECURITY_POLICY_VALUE: &str = "default-src 'self'; \
    style-src 'self' 'unsafe-inline'; script-src 'self'; img-src 'self' data: https:; \
    object-src 'none'; frame-ancestors 'self'";

/// HSTS: one year, subdomains included, preload eligible.
pub const STRICT_TRANSPORT_SECURITY_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

/// Add response hardening headers. Values a handler already set are kept.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(header_if_missing(CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_VALUE))
        .layer(header_if_missing(STRICT_TRANSPORT_SECURITY, STRICT_TRANSPORT_SECURITY_VALUE))
        .layer(header_if_missing(X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(header_if_missing(REFERRER_POLICY, "strict-origin-when-cross-origin"))
}

fn header_if_missing(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}
