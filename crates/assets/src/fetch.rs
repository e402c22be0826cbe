//! Filesystem-backed [`Fetcher`].

use enigma_common::{FetchError, Fetcher, ProgressFn};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Serves locators as paths relative to a root directory.
///
/// A leading `/` is treated as the root itself, so `/models/a.glb` and
/// `models/a.glb` name the same file. Locators with a scheme or `..`
/// components are rejected.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
    chunk_size: usize,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Read granularity; progress is reported once per chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a locator to a path under the root.
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, FetchError> {
        if locator.contains("://") {
            return Err(FetchError::InvalidLocator(locator.to_string()));
        }
        let relative = Path::new(locator.trim_start_matches('/'));
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(FetchError::InvalidLocator(locator.to_string())),
            }
        }
        Ok(path)
    }
}

impl Fetcher for FileFetcher {
    async fn fetch(
        &self,
        locator: &str,
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(locator)?;
        let mut file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(locator.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let total = file.metadata()?.len();

        let mut bytes = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            progress(bytes.len() as u64, Some(total));
        }
        if bytes.is_empty() {
            progress(0, Some(0));
        }
        tracing::debug!(locator, bytes = bytes.len(), "fetched from disk");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_strips_leading_slash() {
        let fetcher = FileFetcher::new("/srv/assets");
        assert_eq!(
            fetcher.resolve("/models/a.glb").unwrap(),
            PathBuf::from("/srv/assets/models/a.glb")
        );
        assert_eq!(
            fetcher.resolve("./b.png").unwrap(),
            PathBuf::from("/srv/assets/b.png")
        );
    }

    #[test]
    fn resolve_rejects_escapes_and_urls() {
        let fetcher = FileFetcher::new("/srv/assets");
        assert!(matches!(
            fetcher.resolve("../secret"),
            Err(FetchError::InvalidLocator(_))
        ));
        assert!(matches!(
            fetcher.resolve("https://example.com/a.glb"),
            Err(FetchError::InvalidLocator(_))
        ));
    }

    #[test]
    fn fetch_reports_progress_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), vec![7u8; 10]).unwrap();
        let fetcher = FileFetcher::new(dir.path()).with_chunk_size(4);

        let mut seen = Vec::new();
        let bytes = pollster::block_on(
            fetcher.fetch("data.bin", &mut |loaded, total| seen.push((loaded, total))),
        )
        .unwrap();

        assert_eq!(bytes.len(), 10);
        assert_eq!(seen, vec![(4, Some(10)), (8, Some(10)), (10, Some(10))]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::new(dir.path());
        let result = pollster::block_on(fetcher.fetch("nope.glb", &mut |_, _| {}));
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }
}
