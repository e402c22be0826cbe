//! Scene: the graph of render objects plus the camera, lights and orbit
//! controls that view it.
//!
//! # Invariants
//! - The scene never talks to the GPU. Renderers read it; they do not own it.
//! - Object ids are unique within a graph.

mod camera;
mod controls;
mod graph;
mod lights;
mod scene;

pub use camera::PerspectiveCamera;
pub use controls::OrbitControls;
pub use graph::{Material, Mesh, MeshHandle, PhysicsLink, SceneGraph, SceneNode};
pub use lights::{AmbientLight, DirectionalLight, Lights, ShadowConfig};
pub use scene::Scene;
