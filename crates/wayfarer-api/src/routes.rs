//! Router setup with the versioned API routes and middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wayfarer_core::config::ServerConfig;
use wayfarer_core::error::WayfarerError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// Routes live under `/{api_version}`. `ask` and `form` are rate limited
/// when `rate_limit_per_sec` is non-zero; `health` never is.
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    let server = &config.server;

    let mut limited = Router::new()
        .route("/ask", post(handlers::ask))
        .route("/form", post(handlers::form));
    if server.rate_limit_per_sec > 0 {
        limited = limited
            .layer(axum::middleware::from_fn(rate_limit_middleware))
            .layer(axum::Extension(RateLimiter::new(server.rate_limit_per_sec)));
    }

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(limited);

    let version = server.api_version.trim_matches('/');
    let root = if version.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&format!("/{}", version), api)
    };

    root.layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .with_state(state)
}

/// CORS from config. `"*"` in origins or headers allows any; invalid
/// entries are skipped with a warning.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origin = if server.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(server.allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|_| tracing::warn!(origin = %o, "Ignoring invalid CORS origin"))
                .ok()
        }))
    };

    let methods: Vec<Method> = server
        .allowed_methods
        .iter()
        .filter_map(|m| {
            m.to_uppercase()
                .parse::<Method>()
                .map_err(|_| tracing::warn!(method = %m, "Ignoring invalid CORS method"))
                .ok()
        })
        .collect();

    let headers = if server.allowed_headers.iter().any(|h| h == "*") {
        AllowHeaders::from(Any)
    } else {
        AllowHeaders::list(server.allowed_headers.iter().filter_map(|h| {
            h.parse::<HeaderName>()
                .map_err(|_| tracing::warn!(header = %h, "Ignoring invalid CORS header"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
}

/// Bind `host:port` from config and serve until Ctrl-C.
pub async fn start_server(state: AppState) -> Result<(), WayfarerError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WayfarerError::Api(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "API server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| WayfarerError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
