//! Shared types for the Enigma scene.
//!
//! Everything here is plain data: no GPU handles, no platform state. The
//! renderer, physics and asset crates all speak these types.

pub mod fetch;
pub mod geometry;
pub mod quality;
mod types;

pub use fetch::{FetchError, Fetcher, ProgressFn};
pub use geometry::Geometry;
pub use quality::{PixelRatioPolicy, QualitySettings, QualityTier};
pub use types::{BodyHandle, ColliderHandle, Color, ObjectId, Transform};
