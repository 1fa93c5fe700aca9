//! gRPC client for rkt's api-service (`rkt api-service`, default port 15441).

use crate::proto::{
    Image, ImageFilter, InspectImageRequest, InspectImageResponse, InspectPodRequest,
    InspectPodResponse, ListImagesRequest, ListImagesResponse, ListPodsRequest, ListPodsResponse,
    Pod, PodFilter,
};
use crate::{Result, RuntimeApi, RuntimeError};
use async_trait::async_trait;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, instrument};

const LIST_PODS: &str = "/v1alpha.PublicAPI/ListPods";
const INSPECT_POD: &str = "/v1alpha.PublicAPI/InspectPod";
const LIST_IMAGES: &str = "/v1alpha.PublicAPI/ListImages";
const INSPECT_IMAGE: &str = "/v1alpha.PublicAPI/InspectImage";

/// Client for `v1alpha.PublicAPI`. Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct RktClient {
    inner: tonic::client::Grpc<Channel>,
}

impl RktClient {
    /// Connects to the api-service. `endpoint` may omit the scheme, as in
    /// `localhost:15441`; the service speaks plaintext HTTP/2.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let uri = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };
        let connect_err = |source| RuntimeError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let channel = Endpoint::from_shared(uri)
            .map_err(connect_err)?
            .connect()
            .await
            .map_err(connect_err)?;

        info!(%endpoint, "Connected to rkt api-service");
        Ok(Self {
            inner: tonic::client::Grpc::new(channel),
        })
    }

    async fn unary<Req, Resp>(
        &self,
        call: &'static str,
        path: &'static str,
        request: Req,
    ) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready().await.map_err(|e| RuntimeError::Rpc {
            call,
            source: tonic::Status::unavailable(format!("service was not ready: {}", e)),
        })?;

        let codec = tonic::codec::ProstCodec::<Req, Resp>::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await
            .map_err(RuntimeError::rpc(call))?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl RuntimeApi for RktClient {
    #[instrument(skip(self))]
    async fn list_images(&self, filter: ImageFilter) -> Result<Vec<Image>> {
        let response: ListImagesResponse = self
            .unary(
                "ListImages",
                LIST_IMAGES,
                ListImagesRequest {
                    filters: vec![filter],
                    detail: false,
                },
            )
            .await?;
        debug!(count = response.images.len(), "Listed images");
        Ok(response.images)
    }

    #[instrument(skip(self))]
    async fn inspect_image(&self, id: &str) -> Result<Option<Image>> {
        let response: InspectImageResponse = self
            .unary(
                "InspectImage",
                INSPECT_IMAGE,
                InspectImageRequest { id: id.to_string() },
            )
            .await?;
        Ok(response.image)
    }

    #[instrument(skip(self))]
    async fn list_pods(&self, filter: PodFilter) -> Result<Vec<Pod>> {
        let response: ListPodsResponse = self
            .unary(
                "ListPods",
                LIST_PODS,
                ListPodsRequest {
                    filters: vec![filter],
                    detail: false,
                },
            )
            .await?;
        debug!(count = response.pods.len(), "Listed pods");
        Ok(response.pods)
    }

    #[instrument(skip(self))]
    async fn inspect_pod(&self, id: &str) -> Result<Option<Pod>> {
        let response: InspectPodResponse = self
            .unary(
                "InspectPod",
                INSPECT_POD,
                InspectPodRequest { id: id.to_string() },
            )
            .await?;
        Ok(response.pod)
    }
}
