/// Existence probes for image candidates.
///
/// A probe answers one question: can this candidate be loaded as an image? Remote
/// candidates are fetched over HTTP; locally-rooted paths (`/images/x.jpg`) are checked
/// either against a public directory on disk or against a configured origin.
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Extensions treated as raster images when probing the filesystem.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

pub trait AssetProbe: Send + Sync {
    /// Resolve to `true` iff `candidate` loads as an image.
    fn probe<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool>;
}

pub(crate) fn is_remote(candidate: &str) -> bool {
    candidate.starts_with("http://") || candidate.starts_with("https://")
}

pub(crate) fn has_image_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// GET the candidate; success iff 2xx with an `image/*` content type.
pub struct HttpProbe {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpProbe {
    pub fn new(base_url: Option<&str>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent("portfolio-catalog/asset-probe")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Absolute URL for a candidate, or `None` when it cannot be fetched over HTTP.
    fn url_for(&self, candidate: &str) -> Option<String> {
        if is_remote(candidate) {
            return Some(candidate.to_string());
        }
        let base = self.base_url.as_ref()?;
        if candidate.starts_with('/') {
            Some(format!("{base}{candidate}"))
        } else {
            Some(format!("{base}/{candidate}"))
        }
    }
}

impl AssetProbe for HttpProbe {
    fn probe<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
        async move {
            let Some(url) = self.url_for(candidate) else {
                return false;
            };
            let resp = match self.http.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(error = %e, url = %url, "image probe request failed");
                    return false;
                }
            };
            let is_image = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("image/"));
            let ok = resp.status().is_success() && is_image;
            debug!(url = %url, status = resp.status().as_u16(), is_image, "image probe finished");
            ok
        }
        .boxed()
    }
}

/// Check locally-rooted candidates against a public directory.
pub struct FsProbe {
    root: PathBuf,
}

impl FsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path under the root for a candidate. Remote URLs and paths escaping the root
    /// have none.
    fn path_for(&self, candidate: &str) -> Option<PathBuf> {
        if is_remote(candidate) {
            return None;
        }
        let relative = Path::new(candidate.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl AssetProbe for FsProbe {
    fn probe<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
        async move {
            let Some(path) = self.path_for(candidate) else {
                return false;
            };
            if !has_image_extension(candidate) {
                return false;
            }
            match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.is_file(),
                Err(_) => false,
            }
        }
        .boxed()
    }
}

/// Remote candidates go to HTTP; local ones to HTTP when an origin is configured,
/// otherwise to the filesystem.
pub struct RoutedProbe {
    http: HttpProbe,
    fs: FsProbe,
    local_over_http: bool,
}

impl RoutedProbe {
    pub fn new(
        public_dir: impl Into<PathBuf>,
        base_url: Option<&str>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: HttpProbe::new(base_url)?,
            fs: FsProbe::new(public_dir),
            local_over_http: base_url.is_some(),
        })
    }
}

impl AssetProbe for RoutedProbe {
    fn probe<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
        if is_remote(candidate) || self.local_over_http {
            self.http.probe(candidate)
        } else {
            self.fs.probe(candidate)
        }
    }
}

/// Treat a probe that does not settle within `timeout` as failed.
pub struct TimeoutProbe {
    inner: Arc<dyn AssetProbe>,
    timeout: Duration,
}

impl TimeoutProbe {
    pub fn new(inner: Arc<dyn AssetProbe>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl AssetProbe for TimeoutProbe {
    fn probe<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
        async move {
            match tokio::time::timeout(self.timeout, self.inner.probe(candidate)).await {
                Ok(ok) => ok,
                Err(_) => {
                    debug!(
                        candidate,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "image probe timed out"
                    );
                    false
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Never;

    impl AssetProbe for Never {
        fn probe<'a>(&'a self, _candidate: &'a str) -> BoxFuture<'a, bool> {
            futures::future::pending().boxed()
        }
    }

    #[test]
    fn test_http_url_for() {
        let probe = HttpProbe::new(Some("https://cdn.example/")).unwrap();
        assert_eq!(
            probe.url_for("/images/a.jpg").as_deref(),
            Some("https://cdn.example/images/a.jpg")
        );
        assert_eq!(
            probe.url_for("http://other/a.png").as_deref(),
            Some("http://other/a.png")
        );

        let no_base = HttpProbe::new(None).unwrap();
        assert_eq!(no_base.url_for("/images/a.jpg"), None);
    }

    #[test]
    fn test_fs_path_rejects_escape() {
        let probe = FsProbe::new("/srv/public");
        assert_eq!(
            probe.path_for("/images/a.jpg"),
            Some(PathBuf::from("/srv/public/images/a.jpg"))
        );
        assert_eq!(probe.path_for("/images/../../etc/passwd"), None);
        assert_eq!(probe.path_for("https://x/a.jpg"), None);
    }

    #[tokio::test]
    async fn test_fs_probe_checks_existence_and_type() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images/a.png"), b"png").unwrap();
        std::fs::write(dir.path().join("images/notes.txt"), b"txt").unwrap();
        std::fs::create_dir_all(dir.path().join("images/dir.jpg")).unwrap();

        let probe = FsProbe::new(dir.path());
        assert!(probe.probe("/images/a.png").await);
        assert!(!probe.probe("/images/a.jpg").await);
        assert!(!probe.probe("/images/notes.txt").await);
        assert!(!probe.probe("/images/dir.jpg").await);
    }

    #[tokio::test]
    async fn test_routed_probe_uses_fs_for_local_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.webp"), b"webp").unwrap();
        let probe = RoutedProbe::new(dir.path(), None).unwrap();
        assert!(probe.probe("/a.webp").await);
        assert!(!probe.probe("/b.webp").await);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let probe = TimeoutProbe::new(Arc::new(Never), Duration::from_millis(50));
        assert!(!probe.probe("/images/a.jpg").await);
    }

    #[test]
    fn test_image_extension_is_case_insensitive() {
        assert!(has_image_extension("/images/x.JPG"));
        assert!(has_image_extension("x.webp"));
        assert!(!has_image_extension("/images/x"));
        assert!(!has_image_extension("/images/x.svg"));
    }
}
