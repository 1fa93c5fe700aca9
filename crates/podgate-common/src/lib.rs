// Shared types for the podgate crates

use std::fmt::Display;

pub use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodgateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous match: {0}")]
    AmbiguousMatch(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("job is not done: unit {unit}, result {result}")]
    JobIncomplete { unit: String, result: String },

    #[error("job timed out after {secs}s: unit {unit}")]
    JobTimeout { unit: String, secs: u64 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PodgateError>;

/// A single environment variable as submitted by a caller or read back
/// from a running pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    pub key: String,
    pub val: String,
}

impl Env {
    pub fn new(key: impl Into<String>, val: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            val: val.into(),
        }
    }
}

/// Listing view of an image in the runtime's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Routing metadata reconstructed from a running pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub image: String,
    pub subdomain: String,
    pub port: u16,
    pub net: String,
    pub host: String,
    pub running: bool,
    pub env: Vec<Env>,
}

impl InstanceInfo {
    /// Entry for a subdomain the runtime no longer reports.
    pub fn placeholder(subdomain: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            image: String::new(),
            subdomain: subdomain.into(),
            port: 0,
            net: String::new(),
            host: String::new(),
            running: false,
            env: Vec::new(),
        }
    }
}

/// How a launch request names its image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSelector {
    Id(String),
    Name(String),
}

impl Display for ImageSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSelector::Id(id) => write!(f, "id {}", id),
            ImageSelector::Name(name) => write!(f, "name {}", name),
        }
    }
}

/// Annotation keys stamped on every pod podgate launches.
///
/// All keys share a configurable prefix so that several podgate
/// deployments can share one rkt host without seeing each other's pods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerKeys {
    prefix: String,
}

impl MarkerKeys {
    pub const MARKER_VALUE: &'static str = "1";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn marker(&self) -> String {
        format!("{}-is", self.prefix)
    }

    pub fn subdomain(&self) -> String {
        format!("{}-subdomain", self.prefix)
    }

    pub fn port(&self) -> String {
        format!("{}-port", self.prefix)
    }

    pub fn net(&self) -> String {
        format!("{}-net", self.prefix)
    }
}

/// Subdomains are limited to `[a-zA-Z0-9-.]+`.
pub fn is_valid_subdomain(subdomain: &str) -> bool {
    !subdomain.is_empty()
        && subdomain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
