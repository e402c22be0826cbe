use enigma_common::{BodyHandle, ColliderHandle, Color, Geometry, ObjectId, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a mesh as seen by GPU backends. Uploads are cached per handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshHandle(pub Uuid);

impl MeshHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MeshHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Triangle geometry shared between nodes (and with physics colliders).
#[derive(Debug, Clone)]
pub struct Mesh {
    pub handle: MeshHandle,
    pub geometry: Arc<Geometry>,
}

impl Mesh {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            handle: MeshHandle::new(),
            geometry: Arc::new(geometry),
        }
    }
}

/// Physically based surface parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Color,
    pub emissive: Color,
    pub metalness: f32,
    pub roughness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            emissive: Color::BLACK,
            metalness: 0.0,
            roughness: 1.0,
        }
    }
}

/// Back-reference from a node to the rigid body that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsLink {
    pub body: BodyHandle,
    pub collider: ColliderHandle,
}

/// A renderable (or empty) object in the scene.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub mesh: Option<Mesh>,
    pub material: Material,
    /// Set when a physics world owns this node's transform.
    pub physics: Option<PhysicsLink>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            visible: true,
            mesh: None,
            material: Material::default(),
            physics: None,
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh, material: Material) -> Self {
        self.mesh = Some(mesh);
        self.material = material;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_physics_controlled(&self) -> bool {
        self.physics.is_some()
    }
}

/// Flat collection of scene nodes keyed by id.
///
/// Iteration order is the id order, so two traversals of the same graph
/// always visit nodes identically.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<ObjectId, SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> ObjectId {
        let id = ObjectId::new();
        self.add_with_id(id, node);
        id
    }

    /// Insert under a caller-chosen id, replacing any node already there.
    pub fn add_with_id(&mut self, id: ObjectId, node: SceneNode) -> Option<SceneNode> {
        tracing::debug!(id = %id.short(), name = %node.name, "scene node added");
        self.nodes.insert(id, node)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneNode> {
        self.nodes.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &SceneNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut SceneNode)> {
        self.nodes.iter_mut().map(|(id, node)| (*id, node))
    }

    /// First node with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.iter().find(|(_, n)| n.name == name).map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Detach every mesh, handing each distinct handle to `release` once,
    /// then drop all nodes.
    pub fn release_meshes(&mut self, mut release: impl FnMut(MeshHandle)) {
        let mut released = std::collections::BTreeSet::new();
        for node in self.nodes.values_mut() {
            if let Some(mesh) = node.mesh.take() {
                if released.insert(mesh.handle) {
                    release(mesh.handle);
                }
            }
        }
        self.nodes.clear();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
