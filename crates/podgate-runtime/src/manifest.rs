//! appc image and pod manifests, and the merge that turns a stored image into
//! a pod manifest rkt can run with `--pod-manifest`.

use crate::proto::Image;
use crate::{Result, RuntimeError};
use podgate_common::Env;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// appc schema version written into generated pod manifests.
pub const AC_VERSION: &str = "0.8.11";

// Go's encoding/json writes nil slices as `null`; rkt's manifests are full of them.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{"name": .., "value": ..}`, the shape appc uses for labels, annotations
/// and environment variables alike.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The `app` section of an image manifest.
///
/// Only the environment is interpreted; `exec`, `user`, `group`, ports,
/// isolators and the rest are carried through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub environment: Vec<NameValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl App {
    /// Overwrites `name` in place, or appends it when undeclared.
    pub fn set_env(&mut self, name: &str, value: &str) {
        match self.environment.iter_mut().find(|env| env.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self.environment.push(NameValue::new(name, value)),
        }
    }

    pub fn env(&self) -> Vec<Env> {
        self.environment
            .iter()
            .map(|env| Env::new(env.name.clone(), env.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub ac_kind: String,
    pub ac_version: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<NameValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub id: String,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub labels: Vec<NameValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeApp {
    pub name: String,
    pub image: RuntimeImage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodManifest {
    pub ac_kind: String,
    pub ac_version: String,
    pub apps: Vec<RuntimeApp>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub volumes: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub isolators: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub annotations: Vec<NameValue>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ports: Vec<Value>,
}

impl Default for PodManifest {
    fn default() -> Self {
        Self {
            ac_kind: "PodManifest".to_string(),
            ac_version: AC_VERSION.to_string(),
            apps: Vec::new(),
            volumes: Vec::new(),
            isolators: Vec::new(),
            annotations: Vec::new(),
            ports: Vec::new(),
        }
    }
}

impl PodManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations
            .iter()
            .find(|annotation| annotation.name == name)
            .map(|annotation| annotation.value.as_str())
    }
}

/// Checks an appc image id: `sha512-` followed by lowercase hex.
pub fn validate_image_id(id: &str) -> Result<()> {
    let valid = id
        .strip_prefix("sha512-")
        .map(|hex| {
            !hex.is_empty()
                && hex.len() <= 128
                && hex
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(RuntimeError::InvalidId(id.to_string()))
    }
}

/// Builds the pod manifest for one app from `image`.
///
/// `env` is applied in order on top of the image's declared environment, so
/// the last value for a repeated key wins. Annotations are written sorted by
/// name; callers must not rely on any particular order.
pub fn build_pod_manifest(
    image: &Image,
    annotations: &HashMap<String, String>,
    env: &[Env],
) -> Result<PodManifest> {
    let manifest = ImageManifest::from_slice(&image.manifest)?;
    validate_image_id(&image.id)?;

    let mut app = manifest.app.ok_or_else(|| {
        RuntimeError::Manifest(serde::de::Error::custom(format!(
            "image {} declares no app",
            manifest.name
        )))
    })?;
    for Env { key, val } in env {
        app.set_env(key, val);
    }

    let app_name = manifest
        .name
        .rsplit('/')
        .next()
        .unwrap_or(manifest.name.as_str())
        .to_string();

    let mut pod_annotations: Vec<NameValue> = annotations
        .iter()
        .map(|(name, value)| NameValue::new(name.clone(), value.clone()))
        .collect();
    pod_annotations.sort();

    Ok(PodManifest {
        apps: vec![RuntimeApp {
            name: app_name,
            image: RuntimeImage {
                name: Some(manifest.name),
                id: image.id.clone(),
                labels: manifest.labels,
            },
            app: Some(app),
        }],
        annotations: pod_annotations,
        ..Default::default()
    })
}
