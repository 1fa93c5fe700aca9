//! Subdomain to backend routing table.
//!
//! Every known subdomain is either Pending (launched or seen at boot, not
//! yet looked up) or Bound to the address of its pod. A Bound entry is kept
//! until the subdomain is terminated.

use podgate_common::{InstanceInfo, PodgateError, Result};
use podgate_runtime::InstanceRegistry;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub host: String,
    pub port: u16,
}

impl Backend {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Where a subdomain stands in the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteState {
    Unbound,
    Pending,
    Bound(Backend),
}

/// Outcome of routing a request for a subdomain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The subdomain was never launched or has been terminated.
    Unknown,
    Bound(Backend),
}

pub struct RoutingCache {
    registry: InstanceRegistry,
    entries: RwLock<HashMap<String, Option<Backend>>>,
}

impl RoutingCache {
    pub fn new(registry: InstanceRegistry) -> Self {
        Self {
            registry,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Marks every subdomain the runtime currently reports as Pending.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<usize> {
        let running = self.registry.list_running().await?;
        let count = running.len();
        let mut entries = self.entries.write().await;
        for subdomain in running.into_keys() {
            entries.entry(subdomain).or_insert(None);
        }
        info!(count, "Routing table bootstrapped");
        Ok(count)
    }

    /// Marks `subdomain` Pending, dropping any previous binding.
    pub async fn add(&self, subdomain: &str) {
        debug!(%subdomain, "Route added");
        self.entries
            .write()
            .await
            .insert(subdomain.to_string(), None);
    }

    pub async fn remove(&self, subdomain: &str) {
        debug!(%subdomain, "Route removed");
        self.entries.write().await.remove(subdomain);
    }

    pub async fn state(&self, subdomain: &str) -> RouteState {
        match self.entries.read().await.get(subdomain) {
            None => RouteState::Unbound,
            Some(None) => RouteState::Pending,
            Some(Some(backend)) => RouteState::Bound(backend.clone()),
        }
    }

    /// Looks up the backend for `subdomain`, asking the runtime on the first
    /// request after a launch.
    ///
    /// A failed lookup leaves the entry Pending so the next request retries.
    /// The lookup runs unlocked and only binds an entry that is still Pending
    /// once it returns.
    #[instrument(skip(self))]
    pub async fn resolve(&self, subdomain: &str) -> Result<Route> {
        match self.entries.read().await.get(subdomain) {
            None => return Ok(Route::Unknown),
            Some(Some(backend)) => return Ok(Route::Bound(backend.clone())),
            Some(None) => {}
        }

        info!(%subdomain, "Resolving pending route");
        let instance = self.registry.get(subdomain).await?;
        if !instance.running {
            warn!(%subdomain, "Pending route has no running pod");
            return Err(PodgateError::NotFound(format!(
                "container not running: {}",
                subdomain
            )));
        }
        let resolved = Backend {
            host: instance.host,
            port: instance.port,
        };

        let mut entries = self.entries.write().await;
        match entries.get_mut(subdomain) {
            None => {
                debug!(%subdomain, "Route removed while resolving");
                Ok(Route::Unknown)
            }
            Some(Some(existing)) => Ok(Route::Bound(existing.clone())),
            Some(slot) => {
                info!(%subdomain, backend = %resolved.url(), "Route bound");
                *slot = Some(resolved.clone());
                Ok(Route::Bound(resolved))
            }
        }
    }

    /// Instance details for every known subdomain, ordered by subdomain.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<InstanceInfo>> {
        let mut subdomains: Vec<String> = self.entries.read().await.keys().cloned().collect();
        subdomains.sort();

        let mut running = self.registry.list_running().await?;
        Ok(subdomains
            .into_iter()
            .map(|subdomain| {
                running
                    .remove(&subdomain)
                    .unwrap_or_else(|| InstanceInfo::placeholder(subdomain))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgate_common::{Env, MarkerKeys};
    use podgate_runtime::build_pod_manifest;
    use podgate_runtime::test_utils::{image, running_pod, MockRuntime};
    use std::sync::Arc;

    async fn add_running(runtime: &MockRuntime, pod_id: &str, subdomain: &str, ipv4: &str) {
        let keys = MarkerKeys::new("phantasma");
        let annotations = HashMap::from([
            (keys.marker(), "1".to_string()),
            (keys.subdomain(), subdomain.to_string()),
            (keys.port(), "8080".to_string()),
            (keys.net(), "default".to_string()),
        ]);
        let manifest = build_pod_manifest(
            &image("sha512-aa11", "foo/bar", "1.0"),
            &annotations,
            &[Env::new("X", "1")],
        )
        .unwrap();
        runtime
            .add_pod(running_pod(pod_id, &manifest, &[("default", ipv4)]))
            .await;
    }

    fn cache(runtime: Arc<MockRuntime>) -> RoutingCache {
        RoutingCache::new(InstanceRegistry::new(
            runtime,
            MarkerKeys::new("phantasma"),
        ))
    }

    #[tokio::test]
    async fn test_unknown_subdomain() {
        let runtime = Arc::new(MockRuntime::new());
        let cache = cache(runtime.clone());
        assert_eq!(cache.resolve("nope").await.unwrap(), Route::Unknown);
        assert_eq!(runtime.list_pods_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_resolution_stays_pending_and_retries() {
        let runtime = Arc::new(MockRuntime::new());
        let cache = cache(runtime.clone());
        cache.add("app1").await;

        // Not running yet.
        assert!(cache.resolve("app1").await.is_err());
        assert_eq!(cache.state("app1").await, RouteState::Pending);

        // Runtime down.
        runtime.set_unavailable(true);
        assert!(cache.resolve("app1").await.is_err());
        assert_eq!(cache.state("app1").await, RouteState::Pending);
        assert_eq!(runtime.list_pods_calls(), 2);

        runtime.set_unavailable(false);
        add_running(&runtime, "pod-1", "app1", "172.16.28.2").await;
        let route = cache.resolve("app1").await.unwrap();
        assert_eq!(
            route,
            Route::Bound(Backend {
                host: "172.16.28.2".to_string(),
                port: 8080,
            })
        );
        assert_eq!(runtime.list_pods_calls(), 3);
    }

    #[tokio::test]
    async fn test_bound_route_is_memoized() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "app1", "172.16.28.2").await;
        let cache = cache(runtime.clone());
        cache.add("app1").await;

        cache.resolve("app1").await.unwrap();
        let second = cache.resolve("app1").await.unwrap();
        assert!(matches!(second, Route::Bound(_)));
        assert_eq!(runtime.list_pods_calls(), 1);
        assert_eq!(runtime.inspect_pod_calls(), 1);
        assert!(matches!(cache.state("app1").await, RouteState::Bound(_)));
    }

    #[tokio::test]
    async fn test_remove_from_pending_and_bound() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "bound", "172.16.28.2").await;
        let cache = cache(runtime);
        cache.add("pending").await;
        cache.add("bound").await;
        cache.resolve("bound").await.unwrap();

        cache.remove("pending").await;
        cache.remove("bound").await;
        assert_eq!(cache.state("pending").await, RouteState::Unbound);
        assert_eq!(cache.state("bound").await, RouteState::Unbound);
        assert_eq!(cache.resolve("bound").await.unwrap(), Route::Unknown);
    }

    #[tokio::test]
    async fn test_add_resets_binding() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "app1", "172.16.28.2").await;
        let cache = cache(runtime);
        cache.add("app1").await;
        cache.resolve("app1").await.unwrap();

        cache.add("app1").await;
        assert_eq!(cache.state("app1").await, RouteState::Pending);
    }

    #[tokio::test]
    async fn test_bootstrap_marks_running_pods_pending() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "app1", "172.16.28.2").await;
        add_running(&runtime, "pod-2", "app2", "172.16.28.3").await;
        let cache = cache(runtime);
        cache.add("launched").await;

        assert_eq!(cache.bootstrap().await.unwrap(), 2);
        assert_eq!(cache.state("app1").await, RouteState::Pending);
        assert_eq!(cache.state("app2").await, RouteState::Pending);
        assert_eq!(cache.state("launched").await, RouteState::Pending);
    }

    #[tokio::test]
    async fn test_remove_during_resolution_leaves_no_binding() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "app1", "172.16.28.2").await;
        let gate = runtime.gate_pod_lookups().await;
        let cache = Arc::new(cache(runtime.clone()));
        cache.add("app1").await;

        let resolving = tokio::spawn({
            let cache = cache.clone();
            async move { cache.resolve("app1").await }
        });
        while runtime.list_pods_calls() == 0 {
            tokio::task::yield_now().await;
        }

        // The lookup is parked inside the runtime and holds no lock.
        cache.remove("app1").await;
        gate.notify_one();

        assert_eq!(resolving.await.unwrap().unwrap(), Route::Unknown);
        assert_eq!(cache.state("app1").await, RouteState::Unbound);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_agree() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "app1", "172.16.28.2").await;
        let cache = Arc::new(cache(runtime));
        cache.add("app1").await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve("app1").await })
            })
            .collect();
        for task in tasks {
            let route = task.await.unwrap().unwrap();
            assert_eq!(
                route,
                Route::Bound(Backend {
                    host: "172.16.28.2".to_string(),
                    port: 8080,
                })
            );
        }
        assert!(matches!(cache.state("app1").await, RouteState::Bound(_)));
    }

    #[tokio::test]
    async fn test_list_is_sorted_with_placeholders() {
        let runtime = Arc::new(MockRuntime::new());
        add_running(&runtime, "pod-1", "zeta", "172.16.28.2").await;
        add_running(&runtime, "pod-2", "alpha", "172.16.28.3").await;
        let cache = cache(runtime);
        cache.add("zeta").await;
        cache.add("mid").await;
        cache.add("alpha").await;

        let list = cache.list().await.unwrap();
        let order: Vec<&str> = list.iter().map(|i| i.subdomain.as_str()).collect();
        assert_eq!(order, vec!["alpha", "mid", "zeta"]);
        assert!(list[0].running);
        assert_eq!(list[1], InstanceInfo::placeholder("mid"));
        assert_eq!(list[2].host, "172.16.28.2");
    }
}
