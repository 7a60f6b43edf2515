//! Download URL resolution.
//!
//! [`DownloadUrlResolver`] is the single entry point the sampler and the
//! seed loader use to turn a storage-relative path into a URL. Failures are
//! logged here and re-raised; whether a failure is fatal is the caller's
//! decision (see [`DownloadUrlResolver::resolve_or_empty`]).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::objects::ObjectStore;

#[derive(Clone)]
pub struct DownloadUrlResolver {
    objects: Arc<dyn ObjectStore>,
}

impl DownloadUrlResolver {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Resolve `path` to a download URL.
    pub async fn resolve(&self, path: &str) -> Result<String> {
        if path.trim().is_empty() {
            let err = Error::InvalidData("empty storage path".to_string());
            warn!(provider = self.objects.provider(), error = %err, "download url not resolved");
            return Err(err);
        }
        match self.objects.download_url(path).await {
            Ok(url) => {
                debug!(provider = self.objects.provider(), path, "download url resolved");
                Ok(url)
            }
            Err(e) => {
                warn!(provider = self.objects.provider(), path, error = %e, "download url not resolved");
                Err(e)
            }
        }
    }

    /// Best-effort variant: any failure degrades to an empty string.
    pub async fn resolve_or_empty(&self, path: &str) -> String {
        self.resolve(path).await.unwrap_or_default()
    }
}

/// Storage path of a catalog image: `cloth/{style}/{file}`.
pub fn cloth_image_path(style: &str, file: &str) -> String {
    format!("cloth/{}/{}", style, file)
}

/// Storage path of a song thumbnail: `music_thumbnail/{file}`.
pub fn music_thumbnail_path(file: &str) -> String {
    format!("music_thumbnail/{}", file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PublicObjectStore;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ObjectStore for Unreachable {
        fn provider(&self) -> &str {
            "unreachable"
        }
        async fn download_url(&self, path: &str) -> Result<String> {
            Err(Error::Transport(format!("cannot reach bucket for {}", path)))
        }
    }

    #[tokio::test]
    async fn resolves_through_backend() {
        let r = DownloadUrlResolver::new(Arc::new(PublicObjectStore::new("https://cdn")));
        let url = r.resolve(&cloth_image_path("casual", "1.jpg")).await.unwrap();
        assert_eq!(url, "https://cdn/cloth/casual/1.jpg");
    }

    #[tokio::test]
    async fn failure_is_reraised_and_degradable() {
        let r = DownloadUrlResolver::new(Arc::new(Unreachable));
        let err = r.resolve(&music_thumbnail_path("a.jpg")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(r.resolve_or_empty("x.jpg").await, "");
    }

    #[tokio::test]
    async fn empty_path_rejected() {
        let r = DownloadUrlResolver::new(Arc::new(PublicObjectStore::new("https://cdn")));
        assert!(matches!(r.resolve("  ").await, Err(Error::InvalidData(_))));
    }
}
