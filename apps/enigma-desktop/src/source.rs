use crate::config::AppConfig;
use enigma_assets::FileFetcher;
use enigma_common::{FetchError, Fetcher, ProgressFn};
use enigma_offline::{
    CacheError, CacheStorage, FileNetwork, OfflineWorker, SYNC_TAG, WorkerClient, WorkerConfig,
    WorkerHandle,
};

/// Origin the offline worker serves the asset root under.
pub const LOCAL_ORIGIN: &str = "https://enigma.local";

/// Where asset bytes come from.
pub enum AssetSource {
    Disk(FileFetcher),
    /// Through the offline cache worker.
    Cached(WorkerClient),
}

impl Fetcher for AssetSource {
    async fn fetch(
        &self,
        locator: &str,
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::Disk(files) => files.fetch(locator, progress).await,
            Self::Cached(client) => client.fetch(locator, progress).await,
        }
    }
}

/// Spawn the offline worker over the asset root, install and activate it.
pub fn start_offline(config: &AppConfig) -> Result<WorkerHandle, CacheError> {
    let storage = CacheStorage::new(&config.offline.cache_dir)?;
    let network = FileNetwork::new(&config.asset_root, LOCAL_ORIGIN);
    let worker = OfflineWorker::new(
        storage,
        network,
        WorkerConfig {
            cache_name: config.offline.cache_name.clone(),
            precache: config.offline.precache.clone(),
        },
    );
    let handle = WorkerHandle::spawn(worker)?;
    let client = handle.client();
    client.install()?;
    let removed = client.activate()?;
    client.sync(SYNC_TAG)?;
    tracing::info!(
        cache = %config.offline.cache_name,
        stale_removed = removed.len(),
        "offline cache active"
    );
    Ok(handle)
}

/// Pick the asset source for `config`. The worker handle, when one is
/// returned, must outlive every fetch.
pub fn asset_source(config: &AppConfig) -> (AssetSource, Option<WorkerHandle>) {
    if config.offline.enabled {
        match start_offline(config) {
            Ok(handle) => return (AssetSource::Cached(handle.client()), Some(handle)),
            Err(err) => tracing::warn!(error = %err, "offline cache unavailable, reading assets from disk"),
        }
    }
    (AssetSource::Disk(FileFetcher::new(&config.asset_root)), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enigma_offline::WorkerState;

    fn site() -> (tempfile::TempDir, AppConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("assets");
        std::fs::create_dir_all(root.join("models")).unwrap();
        std::fs::write(root.join("models/a.glb"), [7u8; 16]).unwrap();
        let mut config = AppConfig {
            asset_root: root,
            ..AppConfig::default()
        };
        config.offline.cache_dir = tmp.path().join("cache");
        (tmp, config)
    }

    #[test]
    fn disabled_offline_reads_from_disk() {
        let (_tmp, mut config) = site();
        config.offline.enabled = false;
        let (source, handle) = asset_source(&config);
        assert!(matches!(source, AssetSource::Disk(_)));
        assert!(handle.is_none());
        let bytes = pollster::block_on(source.fetch("models/a.glb", &mut |_, _| {})).unwrap();
        assert_eq!(bytes, vec![7u8; 16]);
    }

    #[test]
    fn offline_source_serves_and_caches() {
        let (_tmp, config) = site();
        let (source, handle) = asset_source(&config);
        let handle = handle.unwrap();
        assert_eq!(handle.client().state().unwrap(), WorkerState::Activated);

        let mut reported = None;
        let bytes = pollster::block_on(
            source.fetch("models/a.glb", &mut |loaded, total| reported = Some((loaded, total))),
        )
        .unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(reported, Some((16, Some(16))));

        std::fs::remove_file(config.asset_root.join("models/a.glb")).unwrap();
        let cached = pollster::block_on(source.fetch("models/a.glb", &mut |_, _| {})).unwrap();
        assert_eq!(cached, bytes);
    }

    #[test]
    fn failed_precache_falls_back_to_disk() {
        let (_tmp, mut config) = site();
        config.offline.precache = vec!["missing.bin".into()];
        let (source, handle) = asset_source(&config);
        assert!(matches!(source, AssetSource::Disk(_)));
        assert!(handle.is_none());
    }
}
