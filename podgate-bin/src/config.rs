// Process configuration read from PODGATE_* environment variables

use podgate_common::{PodgateError, Result};
use podgate_gateway::{FormDefaults, GatewayConfig};
use podgate_supervisor::UnitConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Address of the rkt api-service.
    pub api_endpoint: String,
    pub gateway: GatewayConfig,
    pub units: UnitConfig,
}

fn parse<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| PodgateError::Config(format!("{} is not valid: {}", key, raw))),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let string = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let domain = var("PODGATE_DOMAIN")
            .ok_or_else(|| PodgateError::Config("PODGATE_DOMAIN is required".to_string()))?;

        let units = UnitConfig {
            prefix: string("PODGATE_PREFIX", "phantasma"),
            service_dir: PathBuf::from(string("PODGATE_SERVICE_DIR", "/etc/systemd/system")),
            tmp_dir: PathBuf::from(string("PODGATE_TMP_DIR", "/tmp")),
            rkt: PathBuf::from(string("PODGATE_RKT", "/usr/local/bin/rkt")),
            insecure_options: string("PODGATE_INSECURE_OPTIONS", "image"),
            job_timeout: Duration::from_secs(parse(
                "PODGATE_JOB_TIMEOUT_SECS",
                var("PODGATE_JOB_TIMEOUT_SECS"),
                90,
            )?),
        };

        let gateway = GatewayConfig {
            domain,
            static_dir: PathBuf::from(string("PODGATE_STATIC_DIR", ".")),
            form_defaults: FormDefaults {
                port: parse("PODGATE_DEFAULT_PORT", var("PODGATE_DEFAULT_PORT"), 5000)?,
                net: string("PODGATE_DEFAULT_NET", "default"),
            },
        };

        Ok(Self {
            host: string("PODGATE_HOST", "127.0.0.1"),
            port: parse("PODGATE_PORT", var("PODGATE_PORT"), 5000)?,
            api_endpoint: string("PODGATE_API_ENDPOINT", "localhost:15441"),
            gateway,
            units,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
