/// In-memory `RuntimeApi` for tests
use crate::manifest::PodManifest;
use crate::proto::{App, Image, ImageFilter, KeyValue, Network, Pod, PodFilter, PodState};
use crate::{Result, RuntimeApi, RuntimeError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Image with an appc manifest declaring one app with `PATH` set.
pub fn image(id: &str, name: &str, version: &str) -> Image {
    let base_name = name.rsplit('/').next().unwrap_or(name);
    let manifest = serde_json::json!({
        "acKind": "ImageManifest",
        "acVersion": "0.8.11",
        "name": name,
        "labels": [
            {"name": "version", "value": version},
            {"name": "os", "value": "linux"},
            {"name": "arch", "value": "amd64"}
        ],
        "app": {
            "exec": [format!("/bin/{}", base_name)],
            "user": "0",
            "group": "0",
            "environment": [{"name": "PATH", "value": "/usr/bin"}]
        }
    });
    Image {
        id: id.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        manifest: serde_json::to_vec(&manifest).unwrap_or_default(),
        labels: vec![KeyValue::new("version", version)],
        ..Default::default()
    }
}

/// Running pod as rkt reports it after launching `manifest`.
pub fn running_pod(id: &str, manifest: &PodManifest, networks: &[(&str, &str)]) -> Pod {
    let apps = manifest
        .apps
        .iter()
        .map(|app| {
            let image_name = app.image.name.clone().unwrap_or_default();
            let version = app
                .image
                .labels
                .iter()
                .find(|label| label.name == "version")
                .map(|label| label.value.clone())
                .unwrap_or_default();
            App {
                name: app.name.clone(),
                image: Some(Image {
                    id: app.image.id.clone(),
                    name: image_name,
                    version,
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect();

    Pod {
        id: id.to_string(),
        state: PodState::Running as i32,
        apps,
        networks: networks
            .iter()
            .map(|(name, ipv4)| Network {
                name: name.to_string(),
                ipv4: ipv4.to_string(),
                ..Default::default()
            })
            .collect(),
        manifest: serde_json::to_vec(manifest).unwrap_or_default(),
        annotations: manifest
            .annotations
            .iter()
            .map(|a| KeyValue::new(a.name.clone(), a.value.clone()))
            .collect(),
        ..Default::default()
    }
}

fn image_matches(image: &Image, filter: &ImageFilter) -> bool {
    let (prefix, base_name) = image.name.rsplit_once('/').unwrap_or(("", image.name.as_str()));
    (filter.ids.is_empty() || filter.ids.contains(&image.id))
        && (filter.prefixes.is_empty() || filter.prefixes.iter().any(|p| p == prefix))
        && (filter.base_names.is_empty() || filter.base_names.iter().any(|b| b == base_name))
        && filter
            .labels
            .iter()
            .all(|label| image.labels.contains(label))
}

fn pod_matches(pod: &Pod, filter: &PodFilter) -> bool {
    (filter.states.is_empty() || filter.states.contains(&pod.state))
        && filter
            .annotations
            .iter()
            .all(|annotation| pod.annotations.contains(annotation))
}

/// Mock runtime - records call counts and can be switched offline
#[derive(Default)]
pub struct MockRuntime {
    images: Mutex<Vec<Image>>,
    pods: Mutex<Vec<Pod>>,
    pod_gate: Mutex<Option<Arc<Notify>>>,
    unavailable: AtomicBool,
    list_images: AtomicUsize,
    inspect_image: AtomicUsize,
    list_pods: AtomicUsize,
    inspect_pod: AtomicUsize,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_image(&self, image: Image) {
        self.images.lock().await.push(image);
    }

    pub async fn add_pod(&self, pod: Pod) {
        self.pods.lock().await.push(pod);
    }

    pub async fn remove_pod(&self, id: &str) {
        self.pods.lock().await.retain(|pod| pod.id != id);
    }

    /// Holds every later `list_pods` call until the returned gate is
    /// notified once per held call.
    pub async fn gate_pod_lookups(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.pod_gate.lock().await = Some(gate.clone());
        gate
    }

    /// Every call fails with `UNAVAILABLE` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn list_images_calls(&self) -> usize {
        self.list_images.load(Ordering::SeqCst)
    }

    pub fn inspect_image_calls(&self) -> usize {
        self.inspect_image.load(Ordering::SeqCst)
    }

    pub fn list_pods_calls(&self) -> usize {
        self.list_pods.load(Ordering::SeqCst)
    }

    pub fn inspect_pod_calls(&self) -> usize {
        self.inspect_pod.load(Ordering::SeqCst)
    }

    fn check(&self, call: &'static str, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Rpc {
                call,
                source: tonic::Status::unavailable("mock runtime offline"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RuntimeApi for MockRuntime {
    async fn list_images(&self, filter: ImageFilter) -> Result<Vec<Image>> {
        self.check("ListImages", &self.list_images)?;
        let images = self.images.lock().await;
        Ok(images
            .iter()
            .filter(|image| image_matches(image, &filter))
            .map(|image| Image {
                // Listings carry no manifest, like rkt without `detail`.
                manifest: Vec::new(),
                ..image.clone()
            })
            .collect())
    }

    async fn inspect_image(&self, id: &str) -> Result<Option<Image>> {
        self.check("InspectImage", &self.inspect_image)?;
        let images = self.images.lock().await;
        Ok(images.iter().find(|image| image.id == id).cloned())
    }

    async fn list_pods(&self, filter: PodFilter) -> Result<Vec<Pod>> {
        self.check("ListPods", &self.list_pods)?;
        let gate = self.pod_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let pods = self.pods.lock().await;
        Ok(pods
            .iter()
            .filter(|pod| pod_matches(pod, &filter))
            .map(|pod| Pod {
                id: pod.id.clone(),
                state: pod.state,
                ..Default::default()
            })
            .collect())
    }

    async fn inspect_pod(&self, id: &str) -> Result<Option<Pod>> {
        self.check("InspectPod", &self.inspect_pod)?;
        let pods = self.pods.lock().await;
        Ok(pods.iter().find(|pod| pod.id == id).cloned())
    }
}
