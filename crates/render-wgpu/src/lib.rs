//! wgpu render backend.
//!
//! Draws the scene into an HDR target with a shadow-casting key light, then
//! composites bloom onto the window surface. Overlays draw on the returned
//! [`Frame`] before it is presented.
//!
//! # Invariants
//! - The renderer never mutates the scene.
//! - Mesh buffers are uploaded lazily, once per [`enigma_scene::MeshHandle`],
//!   and dropped only through [`Renderer::release_mesh`](enigma_render::Renderer::release_mesh).

mod bloom;
mod context;
mod gpu;
mod shaders;

pub use bloom::BloomPass;
pub use context::GpuContext;
pub use gpu::{Frame, WgpuRenderer};
