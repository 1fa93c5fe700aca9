//! Lifecycle operations shared by every request handler.

use crate::cache::{Route, RoutingCache};
use podgate_common::{Env, ImageInfo, ImageSelector, InstanceInfo, MarkerKeys, Result};
use podgate_runtime::{build_pod_manifest, ImageResolver, InstanceRegistry, RuntimeApi};
use podgate_supervisor::{InitSystem, UnitConfig, UnitManager};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Owns the runtime client, the init system connection and the routing
/// table. Built once at boot; call [`Context::shutdown`] after the server
/// has drained.
pub struct Context {
    resolver: ImageResolver,
    units: UnitManager,
    init: Arc<dyn InitSystem>,
    keys: MarkerKeys,
    cache: RoutingCache,
}

impl Context {
    pub fn new(
        runtime: Arc<dyn RuntimeApi>,
        init: Arc<dyn InitSystem>,
        unit_config: UnitConfig,
    ) -> Self {
        let keys = MarkerKeys::new(unit_config.prefix.clone());
        let registry = InstanceRegistry::new(runtime.clone(), keys.clone());
        Self {
            resolver: ImageResolver::new(runtime),
            units: UnitManager::new(init.clone(), unit_config),
            init,
            keys,
            cache: RoutingCache::new(registry),
        }
    }

    pub fn cache(&self) -> &RoutingCache {
        &self.cache
    }

    pub fn units(&self) -> &UnitManager {
        &self.units
    }

    /// Routes every pod that is already running when the process starts.
    pub async fn bootstrap(&self) -> Result<usize> {
        self.cache.bootstrap().await
    }

    /// Runs `image` as `subdomain`, reachable on `port` of network `net`.
    ///
    /// Any failure aborts the launch. A unit installed before a failed start
    /// is left in place and replaced by the next launch of the subdomain.
    #[instrument(skip(self, image, env), fields(image = %image))]
    pub async fn launch(
        &self,
        image: &ImageSelector,
        subdomain: &str,
        port: u16,
        net: &str,
        env: &[Env],
    ) -> Result<()> {
        let image = match image {
            ImageSelector::Id(id) => self.resolver.resolve_by_id(id).await?,
            ImageSelector::Name(name) => self.resolver.resolve_by_name(name).await?,
        };

        let annotations = HashMap::from([
            (self.keys.marker(), MarkerKeys::MARKER_VALUE.to_string()),
            (self.keys.subdomain(), subdomain.to_string()),
            (self.keys.port(), port.to_string()),
            (self.keys.net(), net.to_string()),
        ]);
        let manifest = build_pod_manifest(&image, &annotations, env)?;
        let json = manifest.to_json()?;

        self.units.install(&json, subdomain).await?;
        self.units.start(subdomain).await?;
        self.cache.add(subdomain).await;

        info!(%subdomain, image_id = %image.id, "Launched");
        Ok(())
    }

    /// Stops the unit of `subdomain` and unroutes it. Deleting the unit
    /// files afterwards is best-effort: the subdomain is gone either way.
    #[instrument(skip(self))]
    pub async fn terminate(&self, subdomain: &str) -> Result<()> {
        self.units.stop(subdomain).await?;
        self.cache.remove(subdomain).await;

        if let Err(e) = self.units.remove(subdomain).await {
            warn!(%subdomain, error = %e, "Could not clean up unit files");
        }

        info!(%subdomain, "Terminated");
        Ok(())
    }

    pub async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        Ok(self.resolver.list().await?)
    }

    pub async fn list_instances(&self) -> Result<Vec<InstanceInfo>> {
        self.cache.list().await
    }

    pub async fn route(&self, subdomain: &str) -> Result<Route> {
        self.cache.resolve(subdomain).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.init.close().await?;
        info!("Context shut down");
        Ok(())
    }
}
