//! Asset manager: named registries of models, textures and environment maps.
//!
//! Bytes come from a [`Fetcher`](enigma_common::Fetcher), so the same manager
//! loads from disk or through the offline cache. Every loaded resource carries
//! an [`AssetId`] derived from the content hash of its source bytes.
//!
//! # Invariants
//! - Loading under an existing name replaces the entry (last write wins).
//! - `dispose` releases every held resource exactly once, then empties all
//!   registries.

mod error;
mod fetch;
mod manager;
mod model;
mod texture;

pub use error::AssetError;
pub use fetch::FileFetcher;
pub use manager::{AssetKind, AssetManager, AssetManifest, ManifestEntry, ReleaseHook, Released};
pub use model::{Model, ModelMesh};
pub use texture::{EnvironmentLevel, EnvironmentMap, Texture};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content-addressed asset ID computed from the source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(head))
    }
}

pub fn crate_info() -> &'static str {
    "enigma-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert_eq!(crate_info(), "enigma-assets v0.1.0");
    }

    #[test]
    fn content_addressed_ids() {
        assert_eq!(AssetId::of(b"torus"), AssetId::of(b"torus"));
        assert_ne!(AssetId::of(b"torus"), AssetId::of(b"knot"));
    }
}
