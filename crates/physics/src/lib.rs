//! Physics: a Rapier world and the system that binds it to scene nodes.
//!
//! # Invariants
//! - The world advances only through [`PhysicsWorld::step`], one fixed
//!   timestep at a time.
//! - Bodies are registered per [`enigma_common::ObjectId`] in a `BTreeMap`,
//!   so poses are written back in a stable order.
//! - Synchronisation is one-way: body poses are copied onto scene nodes, never
//!   read back from them.

mod config;
mod error;
mod system;
mod world;

pub use config::{BodyConfig, ColliderKind, RigidBodyKind, trimesh_from_geometry};
pub use error::PhysicsError;
pub use system::PhysicsSystem;
pub use world::PhysicsWorld;
