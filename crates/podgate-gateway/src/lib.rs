//! Control API and subdomain reverse proxy.
//!
//! Requests for the configured domain reach the control API and static
//! files; requests for `<subdomain>.<domain>` are proxied to the pod
//! launched under that subdomain.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod context;
pub mod forms;
pub mod handlers;
pub mod proxy;

pub use cache::{Backend, Route, RouteState, RoutingCache};
pub use context::Context;
pub use forms::{FormDefaults, LaunchForm, TerminateForm, ValidationErrors};
pub use proxy::{Proxy, ProxyError};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host name of the control API. Pods are served from its subdomains.
    pub domain: String,
    /// Directory served for paths the API does not handle.
    pub static_dir: PathBuf,
    pub form_defaults: FormDefaults,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            static_dir: PathBuf::from("."),
            form_defaults: FormDefaults {
                port: 5000,
                net: "default".to_string(),
            },
        }
    }
}

/// Shared application state
pub struct AppState {
    pub context: Arc<Context>,
    pub proxy: Proxy,
    pub config: GatewayConfig,
}

/// Where a request is dispatched based on its host name.
#[derive(Debug, PartialEq, Eq)]
enum Destination<'a> {
    Api,
    Subdomain(&'a str),
    Unknown,
}

fn destination<'a>(host: &'a str, domain: &str) -> Destination<'a> {
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    if host.eq_ignore_ascii_case(domain) {
        return Destination::Api;
    }
    match host.len().checked_sub(domain.len() + 1) {
        Some(split) if split > 0 && host.is_char_boundary(split) => {
            let (subdomain, rest) = host.split_at(split);
            if rest.starts_with('.') && rest[1..].eq_ignore_ascii_case(domain) {
                Destination::Subdomain(subdomain)
            } else {
                Destination::Unknown
            }
        }
        _ => Destination::Unknown,
    }
}

async fn dispatch_host(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_string();

    match destination(&host, &state.config.domain) {
        Destination::Api => next.run(request).await,
        Destination::Subdomain(subdomain) => {
            let subdomain = subdomain.to_string();
            handlers::route_request(state, &subdomain, request).await
        }
        Destination::Unknown => (StatusCode::NOT_FOUND, "404 page not found\n").into_response(),
    }
}

/// Builds the full application router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/api/launch", get(handlers::launch).post(handlers::launch))
        .route(
            "/api/terminate",
            get(handlers::terminate).post(handlers::terminate),
        )
        .route("/api/image/list", get(handlers::list_images))
        .route("/api/list", get(handlers::list_instances))
        .route("/health", get(handlers::health))
        .fallback_service(static_files)
        .layer(middleware::from_fn_with_state(state.clone(), dispatch_host))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
