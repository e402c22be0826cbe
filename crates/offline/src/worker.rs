use crate::error::CacheError;
use crate::http::{Request, Response};
use crate::network::Network;
use crate::storage::CacheStorage;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CACHE_NAME: &str = "enigma-webgl-cache-v1";
pub const SYNC_TAG: &str = "enigma-sync";
pub const NOTIFICATION_TITLE: &str = "Enigma Labs";
pub const NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";
pub const NOTIFICATION_BADGE: &str = "/icons/badge-72x72.png";

/// Application shell fetched during install.
pub const DEFAULT_PRECACHE: &[&str] = &["/", "/index.html", "/manifest.webmanifest"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the current store; every other store is removed on activation.
    pub cache_name: String,
    /// URLs fetched and stored during install.
    pub precache: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            precache: DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activated,
    /// Install failed; the worker never intercepts anything.
    Redundant,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

/// Something the worker wants a client window to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    ShowNotification {
        title: String,
        body: String,
        icon: String,
        badge: String,
    },
    OpenWindow(String),
}

/// Cache-first request interceptor with an install/activate lifecycle.
#[derive(Debug)]
pub struct OfflineWorker<N> {
    storage: CacheStorage,
    network: N,
    config: WorkerConfig,
    state: WorkerState,
}

impl<N: Network> OfflineWorker<N> {
    pub fn new(storage: CacheStorage, network: N, config: WorkerConfig) -> Self {
        Self {
            storage,
            network,
            config,
            state: WorkerState::Parsed,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Open the current store and precache the shell. Any failure leaves
    /// the worker redundant.
    pub fn install(&mut self) -> Result<(), CacheError> {
        if self.state != WorkerState::Parsed {
            return Err(self.wrong_state("parsed"));
        }
        self.state = WorkerState::Installing;
        match self.precache() {
            Ok(()) => {
                self.state = WorkerState::Installed;
                tracing::info!(cache = %self.config.cache_name, "offline worker installed");
                Ok(())
            }
            Err(e) => {
                self.state = WorkerState::Redundant;
                tracing::error!(error = %e, "offline worker install failed");
                Err(e)
            }
        }
    }

    /// Delete every store except the current one. Returns the deleted names.
    pub fn activate(&mut self) -> Result<Vec<String>, CacheError> {
        if self.state != WorkerState::Installed {
            return Err(self.wrong_state("installed"));
        }
        let mut removed = Vec::new();
        for name in self.storage.keys() {
            if name != self.config.cache_name {
                tracing::info!(cache = %name, "removing old cache");
                self.storage.delete(&name)?;
                removed.push(name);
            }
        }
        self.state = WorkerState::Activated;
        Ok(removed)
    }

    /// Answer from the cache, falling back to the network. Fresh `200`
    /// same-origin responses are stored for next time. Until activation
    /// (and forever, when redundant) requests go straight to the network.
    pub fn handle_fetch(&mut self, request: &Request) -> Result<Response, CacheError> {
        if self.state != WorkerState::Activated {
            return Ok(self.network.fetch(request)?);
        }
        if let Some(hit) = self.storage.match_request(request)? {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(hit);
        }
        let response = self.network.fetch(request)?;
        if response.is_cacheable() {
            let cache = self.storage.open(&self.config.cache_name)?;
            cache.put(request, &response)?;
        }
        Ok(response)
    }

    pub fn handle_push(&self, text: &str) -> ClientAction {
        ClientAction::ShowNotification {
            title: NOTIFICATION_TITLE.to_string(),
            body: text.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
        }
    }

    pub fn handle_notification_click(&self) -> ClientAction {
        ClientAction::OpenWindow("/".to_string())
    }

    /// Background sync. Returns whether the tag was recognised.
    pub fn handle_sync(&self, tag: &str) -> bool {
        if tag == SYNC_TAG {
            tracing::info!(tag, "background sync");
            true
        } else {
            tracing::debug!(tag, "ignoring unknown sync tag");
            false
        }
    }

    fn precache(&mut self) -> Result<(), CacheError> {
        let cache = self.storage.open(&self.config.cache_name)?;
        let requests: Vec<Request> = self.config.precache.iter().map(Request::get).collect();
        cache.add_all(&requests, &self.network)
    }

    fn wrong_state(&self, expected: &'static str) -> CacheError {
        CacheError::InvalidState {
            expected,
            actual: self.state.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseKind;
    use enigma_common::FetchError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Network double that counts calls per URL.
    #[derive(Default)]
    pub struct CountingNetwork {
        pub responses: HashMap<String, Response>,
        pub calls: RefCell<Vec<String>>,
    }

    impl CountingNetwork {
        pub fn serve(mut self, url: &str, status: u16, kind: ResponseKind, body: &str) -> Self {
            self.responses
                .insert(url.to_string(), Response::new(status, kind, body.as_bytes().to_vec()));
            self
        }

        pub fn calls_for(&self, url: &str) -> usize {
            self.calls.borrow().iter().filter(|u| *u == url).count()
        }
    }

    impl Network for CountingNetwork {
        fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.borrow_mut().push(request.url.clone());
            self.responses
                .get(&request.url)
                .cloned()
                .ok_or_else(|| FetchError::Network(format!("unreachable: {}", request.url)))
        }
    }

    fn shell() -> CountingNetwork {
        CountingNetwork::default()
            .serve("/", 200, ResponseKind::Basic, "root")
            .serve("/index.html", 200, ResponseKind::Basic, "index")
            .serve("/manifest.webmanifest", 200, ResponseKind::Basic, "{}")
    }

    fn activated(dir: &std::path::Path, net: CountingNetwork) -> OfflineWorker<CountingNetwork> {
        let storage = CacheStorage::new(dir).unwrap();
        let mut worker = OfflineWorker::new(storage, net, WorkerConfig::default());
        worker.install().unwrap();
        worker.activate().unwrap();
        worker
    }

    #[test]
    fn install_then_activate() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(tmp.path()).unwrap();
        let mut worker = OfflineWorker::new(storage, shell(), WorkerConfig::default());
        assert_eq!(worker.state(), WorkerState::Parsed);
        assert!(worker.activate().is_err());

        worker.install().unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        worker.activate().unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);
        assert!(worker.storage().has(DEFAULT_CACHE_NAME));
    }

    #[test]
    fn failed_install_is_redundant_and_passes_through() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(tmp.path()).unwrap();
        let net = CountingNetwork::default()
            .serve("/", 200, ResponseKind::Basic, "root")
            .serve("/a.png", 200, ResponseKind::Basic, "png");
        let mut worker = OfflineWorker::new(storage, net, WorkerConfig::default());

        assert!(worker.install().is_err());
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(worker.activate().is_err());

        worker.handle_fetch(&Request::get("/a.png")).unwrap();
        worker.handle_fetch(&Request::get("/a.png")).unwrap();
        assert_eq!(worker.network.calls_for("/a.png"), 2);
        assert_eq!(worker.storage().match_request(&Request::get("/a.png")).unwrap(), None);
    }

    #[test]
    fn activation_removes_only_old_stores() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut storage = CacheStorage::new(tmp.path()).unwrap();
            storage.open("enigma-webgl-cache-v0").unwrap();
            storage.open("other").unwrap();
        }
        let storage = CacheStorage::new(tmp.path()).unwrap();
        let mut worker = OfflineWorker::new(storage, shell(), WorkerConfig::default());
        worker.install().unwrap();
        let mut removed = worker.activate().unwrap();
        removed.sort();

        assert_eq!(removed, vec!["enigma-webgl-cache-v0".to_string(), "other".to_string()]);
        assert_eq!(worker.storage().keys(), vec![DEFAULT_CACHE_NAME.to_string()]);
    }

    #[test]
    fn hit_skips_the_network() {
        let tmp = tempfile::tempdir().unwrap();
        let mut worker = activated(tmp.path(), shell());
        let before = worker.network.calls_for("/index.html");

        let r = worker.handle_fetch(&Request::get("/index.html")).unwrap();
        assert_eq!(r.body, b"index");
        assert_eq!(worker.network.calls_for("/index.html"), before);
    }

    #[test]
    fn miss_fetches_once_and_stores_basic_200() {
        let tmp = tempfile::tempdir().unwrap();
        let net = shell().serve("/models/a.glb", 200, ResponseKind::Basic, "glb");
        let mut worker = activated(tmp.path(), net);

        worker.handle_fetch(&Request::get("/models/a.glb")).unwrap();
        assert_eq!(worker.network.calls_for("/models/a.glb"), 1);
        worker.handle_fetch(&Request::get("/models/a.glb")).unwrap();
        assert_eq!(worker.network.calls_for("/models/a.glb"), 1);
    }

    #[test]
    fn non_cacheable_responses_are_not_stored() {
        let tmp = tempfile::tempdir().unwrap();
        let net = shell()
            .serve("/missing", 404, ResponseKind::Basic, "")
            .serve("https://cdn.example.com/lib.js", 200, ResponseKind::Cors, "lib")
            .serve("https://cdn.example.com/img.png", 0, ResponseKind::Opaque, "");
        let mut worker = activated(tmp.path(), net);

        for url in ["/missing", "https://cdn.example.com/lib.js", "https://cdn.example.com/img.png"] {
            let first = worker.handle_fetch(&Request::get(url)).unwrap();
            worker.handle_fetch(&Request::get(url)).unwrap();
            assert_eq!(worker.network.calls_for(url), 2, "{url}");
            assert!(!first.is_cacheable());
        }
    }

    #[test]
    fn network_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut worker = activated(tmp.path(), shell());
        assert!(matches!(
            worker.handle_fetch(&Request::get("/offline-only")),
            Err(CacheError::Fetch(_))
        ));
    }

    #[test]
    fn push_click_and_sync() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = activated(tmp.path(), shell());
        assert_eq!(
            worker.handle_push("New scene available"),
            ClientAction::ShowNotification {
                title: "Enigma Labs".into(),
                body: "New scene available".into(),
                icon: "/icons/icon-192x192.png".into(),
                badge: "/icons/badge-72x72.png".into(),
            }
        );
        assert_eq!(worker.handle_notification_click(), ClientAction::OpenWindow("/".into()));
        assert!(worker.handle_sync("enigma-sync"));
        assert!(!worker.handle_sync("other"));
    }
}
