use async_trait::async_trait;
use podgate_common::PodgateError;
use thiserror::Error;

// Re-export dependencies potentially needed by consumers
pub use podgate_common as common;

pub mod client;
pub mod manifest;
pub mod proto;
pub mod registry;
pub mod resolver;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use client::RktClient;
pub use manifest::{build_pod_manifest, ImageManifest, PodManifest};
pub use registry::InstanceRegistry;
pub use resolver::{parse_image_ref, ImageRef, ImageResolver};

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("could not connect to rkt api-service at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("could not {call}: {source}")]
    Rpc {
        call: &'static str,
        #[source]
        source: tonic::Status,
    },
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("image found, but duplicated: {0}")]
    AmbiguousImage(String),
    #[error("malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("malformed image id: {0}")]
    InvalidId(String),
}

impl RuntimeError {
    pub(crate) fn rpc(call: &'static str) -> impl FnOnce(tonic::Status) -> Self {
        move |source| RuntimeError::Rpc { call, source }
    }
}

impl From<RuntimeError> for PodgateError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ImageNotFound(_) => PodgateError::NotFound(err.to_string()),
            RuntimeError::AmbiguousImage(_) => PodgateError::AmbiguousMatch(err.to_string()),
            RuntimeError::Manifest(_) | RuntimeError::InvalidId(_) => {
                PodgateError::Decode(err.to_string())
            }
            RuntimeError::Connect { .. } | RuntimeError::Rpc { .. } => {
                PodgateError::RuntimeUnavailable(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Read-only view of the rkt api-service.
///
/// Every call is one round-trip. Implementations must not retry.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    async fn list_images(&self, filter: proto::ImageFilter) -> Result<Vec<proto::Image>>;

    /// `Ok(None)` when the service answers without an image.
    async fn inspect_image(&self, id: &str) -> Result<Option<proto::Image>>;

    async fn list_pods(&self, filter: proto::PodFilter) -> Result<Vec<proto::Pod>>;

    /// `Ok(None)` when the service answers without a pod.
    async fn inspect_pod(&self, id: &str) -> Result<Option<proto::Pod>>;
}
