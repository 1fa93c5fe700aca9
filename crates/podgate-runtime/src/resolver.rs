//! Image lookup by id or by `[prefix/]name[:version]` reference.

use crate::proto::{Image, ImageFilter, KeyValue};
use crate::{Result, RuntimeApi, RuntimeError};
use podgate_common::ImageInfo;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Label carrying an image's version in the rkt store.
pub const VERSION_LABEL: &str = "version";

/// A parsed image reference. Empty parts are not used for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageRef {
    pub prefix: String,
    pub base_name: String,
    pub version: String,
}

impl ImageRef {
    pub fn to_filter(&self) -> ImageFilter {
        let mut filter = ImageFilter::default();
        if !self.prefix.is_empty() {
            filter.prefixes = vec![self.prefix.clone()];
        }
        if !self.base_name.is_empty() {
            filter.base_names = vec![self.base_name.clone()];
        }
        if !self.version.is_empty() {
            filter.labels = vec![KeyValue::new(VERSION_LABEL, self.version.clone())];
        }
        filter
    }
}

/// Splits `reference` into prefix, base name and version.
///
/// The version is whatever follows the last `:`; the base name is whatever
/// follows the last `/` of the remaining name.
pub fn parse_image_ref(reference: &str) -> ImageRef {
    let (name, version) = match reference.rsplit_once(':') {
        Some((name, version)) => (name, version),
        None => (reference, ""),
    };
    let (prefix, base_name) = match name.rsplit_once('/') {
        Some((prefix, base_name)) => (prefix, base_name),
        None => ("", name),
    };
    ImageRef {
        prefix: prefix.to_string(),
        base_name: base_name.to_string(),
        version: version.to_string(),
    }
}

#[derive(Clone)]
pub struct ImageResolver {
    runtime: Arc<dyn RuntimeApi>,
}

impl ImageResolver {
    pub fn new(runtime: Arc<dyn RuntimeApi>) -> Self {
        Self { runtime }
    }

    #[instrument(skip(self))]
    pub async fn resolve_by_id(&self, id: &str) -> Result<Image> {
        self.runtime
            .inspect_image(id)
            .await?
            .ok_or_else(|| RuntimeError::ImageNotFound(format!("id {}", id)))
    }

    /// Resolves a reference that must match exactly one image.
    #[instrument(skip(self))]
    pub async fn resolve_by_name(&self, reference: &str) -> Result<Image> {
        let image_ref = parse_image_ref(reference);
        debug!(?image_ref, "Parsed image reference");

        let images = self.runtime.list_images(image_ref.to_filter()).await?;
        match images.as_slice() {
            [] => Err(RuntimeError::ImageNotFound(format!("name {}", reference))),
            [image] => {
                info!(id = %image.id, "Resolved image reference");
                self.resolve_by_id(&image.id).await
            }
            _ => Err(RuntimeError::AmbiguousImage(format!(
                "name {} matches {} images",
                reference,
                images.len()
            ))),
        }
    }

    /// Every image in the store.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ImageInfo>> {
        let images = self.runtime.list_images(ImageFilter::default()).await?;
        Ok(images
            .into_iter()
            .map(|image| ImageInfo {
                id: image.id,
                name: image.name,
                version: image.version,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{image, MockRuntime};

    #[test]
    fn test_parse_image_ref() {
        assert_eq!(
            parse_image_ref("foo/bar:1.0"),
            ImageRef {
                prefix: "foo".to_string(),
                base_name: "bar".to_string(),
                version: "1.0".to_string(),
            }
        );
        assert_eq!(
            parse_image_ref("bar"),
            ImageRef {
                prefix: String::new(),
                base_name: "bar".to_string(),
                version: String::new(),
            }
        );
        assert_eq!(
            parse_image_ref("quay.io/coreos/etcd:v3.1.0"),
            ImageRef {
                prefix: "quay.io/coreos".to_string(),
                base_name: "etcd".to_string(),
                version: "v3.1.0".to_string(),
            }
        );
        // Only the last separator of each kind splits.
        assert_eq!(parse_image_ref("a:b:c").version, "c");
        assert_eq!(parse_image_ref("a:b:c").base_name, "a:b");
        assert_eq!(parse_image_ref("example.com/bar:").version, "");
    }

    #[test]
    fn test_filter_only_uses_present_parts() {
        let filter = parse_image_ref("bar").to_filter();
        assert!(filter.prefixes.is_empty());
        assert_eq!(filter.base_names, vec!["bar".to_string()]);
        assert!(filter.labels.is_empty());

        let filter = parse_image_ref("foo/bar:1.0").to_filter();
        assert_eq!(filter.prefixes, vec!["foo".to_string()]);
        assert_eq!(filter.labels, vec![KeyValue::new("version", "1.0")]);
    }

    #[tokio::test]
    async fn test_resolve_by_name_single_match() {
        let runtime = Arc::new(MockRuntime::new());
        runtime
            .add_image(image("sha512-aa11", "foo/bar", "1.0"))
            .await;
        runtime
            .add_image(image("sha512-bb22", "foo/bar", "2.0"))
            .await;
        let resolver = ImageResolver::new(runtime.clone());

        let resolved = resolver.resolve_by_name("foo/bar:1.0").await.unwrap();
        assert_eq!(resolved.id, "sha512-aa11");
        // One listing plus one inspect of the single match.
        assert_eq!(runtime.list_images_calls(), 1);
        assert_eq!(runtime.inspect_image_calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_by_name_not_found() {
        let runtime = Arc::new(MockRuntime::new());
        runtime
            .add_image(image("sha512-aa11", "foo/bar", "1.0"))
            .await;
        let resolver = ImageResolver::new(runtime.clone());

        let err = resolver.resolve_by_name("foo/baz").await.unwrap_err();
        assert!(matches!(err, RuntimeError::ImageNotFound(_)));
        assert_eq!(runtime.inspect_image_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_by_name_ambiguous() {
        let runtime = Arc::new(MockRuntime::new());
        runtime
            .add_image(image("sha512-aa11", "foo/bar", "1.0"))
            .await;
        runtime
            .add_image(image("sha512-bb22", "foo/bar", "2.0"))
            .await;
        let resolver = ImageResolver::new(runtime.clone());

        let err = resolver.resolve_by_name("foo/bar").await.unwrap_err();
        assert!(matches!(err, RuntimeError::AmbiguousImage(_)));
        assert_eq!(runtime.inspect_image_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_by_id() {
        let runtime = Arc::new(MockRuntime::new());
        runtime
            .add_image(image("sha512-aa11", "foo/bar", "1.0"))
            .await;
        let resolver = ImageResolver::new(runtime);

        assert_eq!(
            resolver.resolve_by_id("sha512-aa11").await.unwrap().name,
            "foo/bar"
        );
        assert!(matches!(
            resolver.resolve_by_id("sha512-ffff").await,
            Err(RuntimeError::ImageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_images() {
        let runtime = Arc::new(MockRuntime::new());
        runtime
            .add_image(image("sha512-aa11", "foo/bar", "1.0"))
            .await;
        let resolver = ImageResolver::new(runtime);

        let images = resolver.list().await.unwrap();
        assert_eq!(
            images,
            vec![ImageInfo {
                id: "sha512-aa11".to_string(),
                name: "foo/bar".to_string(),
                version: "1.0".to_string(),
            }]
        );
    }
}
