//! Reconstructs routing metadata of running pods from the runtime.
//!
//! Nothing is cached here: every call costs one `ListPods` plus one
//! `InspectPod` per match, because listings omit manifests and networks.

use crate::manifest::PodManifest;
use crate::proto::{KeyValue, Pod, PodFilter, PodState};
use crate::{Result, RuntimeApi};
use podgate_common::{InstanceInfo, MarkerKeys};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct InstanceRegistry {
    runtime: Arc<dyn RuntimeApi>,
    keys: MarkerKeys,
}

impl InstanceRegistry {
    pub fn new(runtime: Arc<dyn RuntimeApi>, keys: MarkerKeys) -> Self {
        Self { runtime, keys }
    }

    pub fn keys(&self) -> &MarkerKeys {
        &self.keys
    }

    /// Running pods carrying the marker annotation, keyed by subdomain.
    ///
    /// Two pods claiming the same subdomain collapse to whichever the runtime
    /// lists last. Pods whose manifest yields no subdomain are skipped.
    #[instrument(skip(self))]
    pub async fn list_running(&self) -> Result<HashMap<String, InstanceInfo>> {
        let filter = self.running_filter(vec![KeyValue::new(
            self.keys.marker(),
            MarkerKeys::MARKER_VALUE,
        )]);
        let instances = self.inspect_matching(filter).await?;
        Ok(instances
            .into_iter()
            .filter(|info| {
                if info.subdomain.is_empty() {
                    warn!(pod_id = %info.id, "Marked pod has no subdomain");
                }
                !info.subdomain.is_empty()
            })
            .map(|info| (info.subdomain.clone(), info))
            .collect())
    }

    /// The running pod serving `subdomain`, or a `running = false`
    /// placeholder when there is none.
    #[instrument(skip(self))]
    pub async fn get(&self, subdomain: &str) -> Result<InstanceInfo> {
        let filter = self.running_filter(vec![KeyValue::new(self.keys.subdomain(), subdomain)]);
        let instances = self.inspect_matching(filter).await?;
        match instances.into_iter().next() {
            Some(info) => Ok(info),
            None => {
                debug!(%subdomain, "No running pod for subdomain");
                Ok(InstanceInfo::placeholder(subdomain))
            }
        }
    }

    fn running_filter(&self, annotations: Vec<KeyValue>) -> PodFilter {
        PodFilter {
            states: vec![PodState::Running as i32],
            annotations,
            ..Default::default()
        }
    }

    async fn inspect_matching(&self, filter: PodFilter) -> Result<Vec<InstanceInfo>> {
        let pods = self.runtime.list_pods(filter).await?;
        let mut instances = Vec::with_capacity(pods.len());
        for listed in pods {
            match self.runtime.inspect_pod(&listed.id).await? {
                Some(pod) => instances.push(self.to_instance_info(&pod)),
                None => warn!(pod_id = %listed.id, "Pod vanished between list and inspect"),
            }
        }
        Ok(instances)
    }

    /// Only the first app of a pod is consulted.
    pub fn to_instance_info(&self, pod: &Pod) -> InstanceInfo {
        let manifest = PodManifest::from_slice(&pod.manifest).unwrap_or_else(|e| {
            warn!(pod_id = %pod.id, error = %e, "Could not decode pod manifest");
            PodManifest::default()
        });

        let subdomain = manifest
            .annotation(&self.keys.subdomain())
            .unwrap_or_default()
            .to_string();
        let port = manifest
            .annotation(&self.keys.port())
            .map(|port| {
                port.parse::<u16>().unwrap_or_else(|_| {
                    warn!(pod_id = %pod.id, %port, "Invalid port annotation");
                    0
                })
            })
            .unwrap_or(0);
        let net = manifest
            .annotation(&self.keys.net())
            .unwrap_or_default()
            .to_string();

        let host = pod
            .networks
            .iter()
            .filter(|network| network.name == net)
            .last()
            .map(|network| network.ipv4.clone())
            .unwrap_or_default();

        let image = pod
            .apps
            .first()
            .and_then(|app| app.image.as_ref())
            .map(|image| format!("{}:{}", image.name, image.version))
            .unwrap_or_default();

        let env = manifest
            .apps
            .first()
            .and_then(|app| app.app.as_ref())
            .map(|app| app.env())
            .unwrap_or_default();

        InstanceInfo {
            id: pod.id.clone(),
            image,
            subdomain,
            port,
            net,
            host,
            running: true,
            env,
        }
    }
}
