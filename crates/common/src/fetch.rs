//! Byte fetching abstraction used by the asset loaders.
//!
//! The asset manager never touches the filesystem or the network directly; it
//! asks a [`Fetcher`] for the bytes behind a locator. The offline cache worker
//! is one such fetcher, which is how asset requests get intercepted.

use std::future::Future;

/// Progress callback: `(bytes_loaded, bytes_total)`. Total is `None` when the
/// source does not know its length up front.
pub type ProgressFn<'a> = dyn FnMut(u64, Option<u64>) + 'a;

/// Errors from fetching a locator.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("cross-origin request refused: {0}")]
    CrossOrigin(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Resolves a locator (path or URL) to its bytes.
pub trait Fetcher {
    fn fetch(
        &self,
        locator: &str,
        progress: &mut ProgressFn<'_>,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>>;
}

impl<T: Fetcher> Fetcher for &T {
    fn fetch(
        &self,
        locator: &str,
        progress: &mut ProgressFn<'_>,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> {
        (**self).fetch(locator, progress)
    }
}
