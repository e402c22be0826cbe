//! Offline cache worker.
//!
//! A versioned, on-disk response cache with the lifecycle of a browser
//! service worker: install precaches the application shell, activation
//! deletes stale stores, and fetches are answered cache-first. The worker
//! runs on its own thread behind a [`WorkerHandle`]; its [`WorkerClient`] is
//! a [`Fetcher`](enigma_common::Fetcher), so asset loads go through it.
//!
//! # Invariants
//! - A cache hit never touches the network.
//! - Only `200` same-origin responses are stored.
//! - Precaching is all-or-nothing.

mod error;
mod handle;
mod http;
mod network;
mod storage;
mod worker;

pub use error::CacheError;
pub use handle::{WorkerClient, WorkerHandle};
pub use http::{Request, Response, ResponseKind};
pub use network::{FileNetwork, Network};
pub use storage::{Cache, CacheStorage};
pub use worker::{
    ClientAction, DEFAULT_CACHE_NAME, DEFAULT_PRECACHE, OfflineWorker, SYNC_TAG, WorkerConfig,
    WorkerState,
};

pub fn crate_info() -> &'static str {
    "enigma-offline v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert_eq!(crate_info(), "enigma-offline v0.1.0");
    }
}
