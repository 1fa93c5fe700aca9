//! Forwards a request to a pod and streams the answer back.

use crate::cache::Backend;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, instrument};

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("could not build response: {0}")]
    Response(#[from] axum::http::Error),
    #[error("backend {backend} unreachable: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: reqwest::Error,
    },
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are connection scoped too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
}

impl Proxy {
    pub fn new() -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ProxyError::Client)?;
        Ok(Self { client })
    }

    #[instrument(skip(self, request), fields(backend = %backend.url(), method = %request.method(), uri = %request.uri()))]
    pub async fn forward(&self, backend: &Backend, request: Request) -> Result<Response, ProxyError> {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let (parts, body) = request.into_parts();

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", backend.url(), path);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        // Host is forwarded unchanged and copied to X-Forwarded-Host.
        if let Some(host) = headers.get(header::HOST).cloned() {
            headers.insert(X_FORWARDED_HOST, host);
        }
        if let Some(ip) = client_ip {
            let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(prior) => format!("{}, {}", prior, ip),
                None => ip,
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        let body = reqwest::Body::wrap_stream(body.into_data_stream());
        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| ProxyError::Upstream {
                backend: backend.url(),
                source,
            })?;
        debug!(status = %upstream.status(), "Backend answered");

        let mut response = Response::builder().status(upstream.status());
        if let Some(response_headers) = response.headers_mut() {
            *response_headers = upstream.headers().clone();
            strip_hop_by_hop(response_headers);
        }
        Ok(response.body(Body::from_stream(upstream.bytes_stream()))?)
    }
}
