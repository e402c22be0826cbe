use crate::config::BodyConfig;
use crate::error::PhysicsError;
use crate::world::PhysicsWorld;
use enigma_common::ObjectId;
use enigma_scene::{PhysicsLink, SceneGraph, SceneNode};
use glam::Vec3;
use std::collections::BTreeMap;

/// Binds scene nodes to bodies in a lazily created [`PhysicsWorld`].
///
/// Every operation before [`PhysicsSystem::init`] completes is a no-op that
/// logs a warning.
#[derive(Debug)]
pub struct PhysicsSystem {
    gravity: Vec3,
    world: Option<PhysicsWorld>,
    links: BTreeMap<ObjectId, PhysicsLink>,
}

impl PhysicsSystem {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            world: None,
            links: BTreeMap::new(),
        }
    }

    /// Create the simulation world. Calling again once initialised does nothing.
    pub async fn init(&mut self) -> Result<(), PhysicsError> {
        if self.world.is_some() {
            return Ok(());
        }
        self.world = Some(PhysicsWorld::new(self.gravity));
        tracing::info!(gravity = ?self.gravity, "physics initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.world.is_some()
    }

    pub fn world(&self) -> Option<&PhysicsWorld> {
        self.world.as_ref()
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn link(&self, id: ObjectId) -> Option<PhysicsLink> {
        self.links.get(&id).copied()
    }

    pub fn body_count(&self) -> usize {
        self.links.len()
    }

    /// Create a body and collider for `node` and mark the node as physics
    /// driven. Returns `Ok(None)` before initialisation, leaving the world
    /// untouched.
    pub fn add_rigid_body(
        &mut self,
        id: ObjectId,
        node: &mut SceneNode,
        config: &BodyConfig,
    ) -> Result<Option<PhysicsLink>, PhysicsError> {
        let Some(world) = self.world.as_mut() else {
            tracing::warn!(node = %node.name, "physics not initialized yet");
            return Ok(None);
        };

        let position = config.position.unwrap_or(node.transform.position);
        let rotation = config.rotation.unwrap_or(node.transform.rotation);
        let body = config.rigid_body(position, rotation)?;
        let collider = config.collider(node.mesh.as_ref().map(|m| m.geometry.as_ref()))?;
        let link = world.insert(body, collider);

        if let Some(previous) = self.links.remove(&id) {
            world.remove_body(previous.body);
        }
        self.links.insert(id, link);
        node.physics = Some(link);
        tracing::debug!(node = %node.name, kind = ?config.kind, "rigid body added");
        Ok(Some(link))
    }

    pub fn remove_rigid_body(&mut self, id: ObjectId, node: &mut SceneNode) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        if let Some(link) = self.links.remove(&id) {
            world.remove_body(link.body);
            node.physics = None;
        }
    }

    /// Step the world once and copy every moving body's pose onto its node.
    ///
    /// `_dt` is ignored; the world always advances by its fixed timestep.
    pub fn update(&mut self, _dt: f32, graph: &mut SceneGraph) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        world.step();

        for (id, link) in &self.links {
            let Some(body) = world.body(link.body) else {
                continue;
            };
            if body.is_fixed() || body.is_sleeping() {
                continue;
            }
            if let (Some(position), Some(rotation), Some(node)) = (
                world.translation(link.body),
                world.rotation(link.body),
                graph.get_mut(*id),
            ) {
                node.transform.position = position;
                node.transform.rotation = rotation;
            }
        }
    }

    pub fn apply_force(&mut self, id: ObjectId, force: Vec3) {
        if let Some((world, link)) = self.resolve(id) {
            world.add_force(link.body, force);
        }
    }

    pub fn apply_impulse(&mut self, id: ObjectId, impulse: Vec3) {
        if let Some((world, link)) = self.resolve(id) {
            world.apply_impulse(link.body, impulse);
        }
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        let Some(world) = self.world.as_mut() else {
            tracing::warn!("physics not initialized yet");
            return;
        };
        self.gravity = gravity;
        world.set_gravity(gravity);
    }

    /// Remove every body, detaching the nodes that were driven by them.
    pub fn clear(&mut self, graph: &mut SceneGraph) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        for (id, link) in std::mem::take(&mut self.links) {
            world.remove_body(link.body);
            if let Some(node) = graph.get_mut(id) {
                node.physics = None;
            }
        }
    }

    /// Clear all bodies and release the world. [`PhysicsSystem::init`] may be
    /// called again afterwards.
    pub fn dispose(&mut self, graph: &mut SceneGraph) {
        if self.world.is_none() {
            return;
        }
        self.clear(graph);
        self.world = None;
        tracing::info!("physics disposed");
    }

    fn resolve(&mut self, id: ObjectId) -> Option<(&mut PhysicsWorld, PhysicsLink)> {
        let link = self.links.get(&id).copied()?;
        Some((self.world.as_mut()?, link))
    }
}
