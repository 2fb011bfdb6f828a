/// Per-entry image resolution.
///
/// Given a primary image reference, an `AssetResolver` probes an ordered list of
/// candidates one at a time and settles on the first that loads, or on `Failed` when
/// none do. State is published through a `watch` channel so a consumer can render
/// `Loading` immediately and re-render on the single terminal transition.
///
/// Each resolution carries a generation token. Changing the subject or tearing the
/// resolver down advances the generation; a continuation whose token is no longer
/// current drops its outcome instead of publishing it.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::probe::{has_image_extension, AssetProbe};

/// Fallback extensions, tried in this order after the primary.
const VARIANT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "JPG", "PNG", "JPEG", "WEBP",
];

static NAME_AND_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.*[^/])\.(?P<ext>[A-Za-z0-9]+)$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AssetState {
    Loading,
    Loaded { url: String },
    Failed,
}

impl AssetState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Ordered probe list for `primary`: the primary itself, then its base name with each
/// variant extension, skipping the one identical to the primary.
///
/// Variants are only derived when the primary ends in a recognised image extension, so
/// bare hosts (`https://example.com`) and URLs with query strings are probed as-is.
pub fn candidates(primary: &str) -> Vec<String> {
    if primary.trim().is_empty() {
        return Vec::new();
    }
    let mut out = vec![primary.to_string()];

    let Some(caps) = NAME_AND_EXTENSION.captures(primary) else {
        return out;
    };
    if !has_image_extension(primary) {
        return out;
    }
    let base = &caps["base"];
    for ext in VARIANT_EXTENSIONS {
        let candidate = format!("{base}.{ext}");
        if candidate != primary {
            out.push(candidate);
        }
    }
    out
}

/// Marks one resolution. Only the holder of the current generation may publish.
#[derive(Clone)]
pub struct GenerationToken {
    current: Arc<AtomicU64>,
    mine: u64,
}

impl GenerationToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.mine
    }

    /// Publish `next` unless this token went stale. The check runs under the channel's
    /// write lock, so it cannot interleave with a subject change.
    fn publish(&self, state: &watch::Sender<AssetState>, next: AssetState) -> bool {
        state.send_if_modified(|s| {
            if !self.is_current() {
                return false;
            }
            *s = next;
            true
        })
    }
}

/// Probe `candidates` strictly in order and publish the outcome under `token`.
pub(crate) async fn resolve(
    probe: Arc<dyn AssetProbe>,
    candidates: Vec<String>,
    token: GenerationToken,
    state: Arc<watch::Sender<AssetState>>,
) {
    for candidate in candidates {
        if !token.is_current() {
            return;
        }
        let loaded = probe.probe(&candidate).await;
        if !token.is_current() {
            debug!(candidate = %candidate, "dropping stale probe outcome");
            return;
        }
        if loaded {
            debug!(candidate = %candidate, "image candidate resolved");
            token.publish(&state, AssetState::Loaded { url: candidate });
            return;
        }
        debug!(candidate = %candidate, "image candidate failed");
    }
    if token.publish(&state, AssetState::Failed) {
        debug!("all image candidates failed");
    }
}

pub struct AssetResolver {
    probe: Arc<dyn AssetProbe>,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<AssetState>>,
    subject: String,
    task: Option<JoinHandle<()>>,
}

impl AssetResolver {
    /// Start resolving `image_url`. Must be called within a Tokio runtime.
    pub fn start(probe: Arc<dyn AssetProbe>, image_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(AssetState::Loading);
        let mut resolver = Self {
            probe,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            subject: image_url.into(),
            task: None,
        };
        resolver.begin();
        resolver
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn state(&self) -> AssetState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AssetState> {
        self.state.subscribe()
    }

    /// Point the resolver at a new image. The in-flight resolution is discarded and a
    /// fresh one starts from `Loading`. Setting the same subject again is a no-op.
    pub fn set_subject(&mut self, image_url: impl Into<String>) {
        let image_url = image_url.into();
        if image_url == self.subject {
            return;
        }
        self.subject = image_url;
        self.begin();
    }

    /// Wait for the current resolution to reach `Loaded` or `Failed`.
    pub async fn settled(&self) -> AssetState {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(AssetState::is_terminal)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Discard the current resolution without starting another. The state stays as it
    /// was; no later outcome will change it.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn begin(&mut self) {
        let mut mine = 0;
        let generation = &self.generation;
        self.state.send_modify(|s| {
            mine = generation.fetch_add(1, Ordering::SeqCst) + 1;
            *s = AssetState::Loading;
        });
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let token = GenerationToken {
            current: Arc::clone(&self.generation),
            mine,
        };
        let list = candidates(&self.subject);
        debug!(
            subject = %self.subject,
            generation = mine,
            candidates = list.len(),
            "image resolution started"
        );
        self.task = Some(tokio::spawn(resolve(
            Arc::clone(&self.probe),
            list,
            token,
            Arc::clone(&self.state),
        )));
    }
}

impl Drop for AssetResolver {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    /// Succeeds for a fixed set of candidates; optionally holds a candidate's probe
    /// until its gate is opened.
    #[derive(Default)]
    pub(crate) struct ScriptedProbe {
        hits: HashSet<String>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedProbe {
        pub(crate) fn succeeding(hits: &[&str]) -> Self {
            Self {
                hits: hits.iter().map(|h| h.to_string()).collect(),
                ..Self::default()
            }
        }

        fn gate(&self, candidate: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates
                .lock()
                .unwrap()
                .insert(candidate.to_string(), Arc::clone(&gate));
            gate
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AssetProbe for ScriptedProbe {
        fn probe<'a>(&'a self, candidate: &'a str) -> BoxFuture<'a, bool> {
            async move {
                self.calls.lock().unwrap().push(candidate.to_string());
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);

                let gate = self.gates.lock().unwrap().get(candidate).cloned();
                if let Some(gate) = gate {
                    gate.notified().await;
                }

                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.hits.contains(candidate)
            }
            .boxed()
        }
    }

    async fn until_probed(probe: &ScriptedProbe, candidate: &str) {
        while !probe.calls().iter().any(|c| c == candidate) {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_candidate_order() {
        assert_eq!(
            candidates("/images/x.jpg"),
            vec![
                "/images/x.jpg",
                "/images/x.jpeg",
                "/images/x.png",
                "/images/x.webp",
                "/images/x.JPG",
                "/images/x.PNG",
                "/images/x.JPEG",
                "/images/x.WEBP",
            ]
        );
    }

    #[test]
    fn test_primary_is_never_duplicated() {
        let list = candidates("https://cdn.example/a/b.PNG");
        assert_eq!(list[0], "https://cdn.example/a/b.PNG");
        assert_eq!(list.iter().filter(|c| *c == "https://cdn.example/a/b.PNG").count(), 1);
        assert_eq!(list.len(), VARIANT_EXTENSIONS.len());
    }

    #[test]
    fn test_unrecognised_shapes_probe_only_primary() {
        for primary in [
            "https://example.com",
            "https://example.com/photo",
            "/images/x.jpg?w=400",
            "/images/.jpg",
            "/docs/readme.txt",
        ] {
            assert_eq!(candidates(primary), vec![primary.to_string()], "{primary}");
        }
        assert!(candidates("  ").is_empty());
    }

    #[tokio::test]
    async fn test_loads_first_candidate() {
        let probe = Arc::new(ScriptedProbe::succeeding(&["/images/x.jpg"]));
        let resolver = AssetResolver::start(probe.clone(), "/images/x.jpg");
        assert_eq!(
            resolver.settled().await,
            AssetState::Loaded {
                url: "/images/x.jpg".to_string()
            }
        );
        assert_eq!(probe.calls(), vec!["/images/x.jpg"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_candidate() {
        let probe = Arc::new(ScriptedProbe::succeeding(&["/images/x.jpeg"]));
        let resolver = AssetResolver::start(probe.clone(), "/images/x.jpg");
        let mut rx = resolver.subscribe();

        let mut seen = vec![rx.borrow_and_update().clone()];
        while !seen.last().unwrap().is_terminal() {
            rx.changed().await.unwrap();
            seen.push(rx.borrow_and_update().clone());
        }

        assert_eq!(
            seen,
            vec![
                AssetState::Loading,
                AssetState::Loaded {
                    url: "/images/x.jpeg".to_string()
                }
            ]
        );
        assert_eq!(probe.calls(), vec!["/images/x.jpg", "/images/x.jpeg"]);
    }

    #[tokio::test]
    async fn test_fails_after_exhausting_candidates_one_at_a_time() {
        let probe = Arc::new(ScriptedProbe::default());
        let resolver = AssetResolver::start(probe.clone(), "/images/x.jpg");
        assert_eq!(resolver.settled().await, AssetState::Failed);
        assert_eq!(probe.calls(), candidates("/images/x.jpg"));
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_subject_fails_without_probing() {
        let probe = Arc::new(ScriptedProbe::default());
        let resolver = AssetResolver::start(probe.clone(), "");
        assert_eq!(resolver.settled().await, AssetState::Failed);
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_subject_change_discards_stale_outcome() {
        let probe = Arc::new(ScriptedProbe::succeeding(&["/images/old.jpg", "/images/new.png"]));
        let old_gate = probe.gate("/images/old.jpg");

        let mut resolver = AssetResolver::start(probe.clone(), "/images/old.jpg");
        until_probed(&probe, "/images/old.jpg").await;

        resolver.set_subject("/images/new.png");
        assert_eq!(resolver.subject(), "/images/new.png");
        let settled = resolver.settled().await;
        assert_eq!(
            settled,
            AssetState::Loaded {
                url: "/images/new.png".to_string()
            }
        );

        old_gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(resolver.state(), settled);
    }

    #[tokio::test]
    async fn test_same_subject_does_not_restart() {
        let probe = Arc::new(ScriptedProbe::succeeding(&["/images/x.jpg"]));
        let mut resolver = AssetResolver::start(probe.clone(), "/images/x.jpg");
        resolver.settled().await;
        resolver.set_subject("/images/x.jpg");
        assert!(resolver.state().is_terminal());
        assert_eq!(probe.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_token_never_publishes() {
        let probe = Arc::new(ScriptedProbe::succeeding(&["/a.jpg"]));
        let gate = probe.gate("/a.jpg");
        let (tx, rx) = watch::channel(AssetState::Loading);
        let tx = Arc::new(tx);
        let generation = Arc::new(AtomicU64::new(1));
        let token = GenerationToken {
            current: Arc::clone(&generation),
            mine: 1,
        };

        let handle = tokio::spawn(resolve(
            probe.clone(),
            candidates("/a.jpg"),
            token,
            Arc::clone(&tx),
        ));
        until_probed(&probe, "/a.jpg").await;

        generation.fetch_add(1, Ordering::SeqCst);
        gate.notify_one();
        handle.await.unwrap();

        assert_eq!(*rx.borrow(), AssetState::Loading);
        assert_eq!(probe.calls(), vec!["/a.jpg"]);
    }

    #[tokio::test]
    async fn test_cancel_freezes_state() {
        let probe = Arc::new(ScriptedProbe::succeeding(&["/a.jpg"]));
        let gate = probe.gate("/a.jpg");
        let mut resolver = AssetResolver::start(probe.clone(), "/a.jpg");
        until_probed(&probe, "/a.jpg").await;

        resolver.cancel();
        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(resolver.state(), AssetState::Loading);
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let json = serde_json::to_value(AssetState::Loaded {
            url: "/a.jpg".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"status": "loaded", "url": "/a.jpg"}));
    }
}
