//! Rendering adapter: backend selection, surface settings, bloom settings and
//! the renderer-agnostic [`Renderer`] trait.
//!
//! # Invariants
//! - Renderers read the scene; they never mutate it.
//! - Backend selection is one-shot: the preferred backend is tried at most
//!   once, then the fallback.
//! - Applying a quality tier is deterministic and idempotent.

mod backend;
mod renderer;
mod settings;

pub use backend::{BackendKind, RenderError, select_backend};
pub use renderer::{DebugTextRenderer, Renderer};
pub use settings::{BloomSettings, PostProcessing, RenderSettings, ResizeNotifier, apply_quality};

pub fn crate_info() -> &'static str {
    "enigma-render v0.1.0"
}
