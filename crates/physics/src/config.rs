use crate::error::PhysicsError;
use enigma_common::Geometry;
use glam::{Quat, Vec3};
use rapier3d::prelude::{ColliderBuilder, Point, Real, RigidBodyBuilder};
use serde::{Deserialize, Serialize};

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigidBodyKind {
    /// Never moves.
    Fixed,
    /// Driven by its owner; unaffected by forces and contacts.
    Kinematic,
    #[default]
    Dynamic,
}

impl RigidBodyKind {
    fn builder(self) -> RigidBodyBuilder {
        match self {
            Self::Fixed => RigidBodyBuilder::fixed(),
            Self::Kinematic => RigidBodyBuilder::kinematic_position_based(),
            Self::Dynamic => RigidBodyBuilder::dynamic(),
        }
    }
}

/// Which collider to build for a scene node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColliderKind {
    /// Triangle mesh taken from the node's geometry.
    #[default]
    TriMesh,
    /// Box with the given full extents.
    Cuboid { size: Vec3 },
    Ball { radius: f32 },
    /// Aligned with the local Y axis.
    Capsule { half_height: f32, radius: f32 },
}

impl ColliderKind {
    pub fn cuboid() -> Self {
        Self::Cuboid { size: Vec3::ONE }
    }

    pub fn ball() -> Self {
        Self::Ball { radius: 0.5 }
    }

    pub fn capsule() -> Self {
        Self::Capsule {
            half_height: 0.5,
            radius: 0.5,
        }
    }

    /// Shape builder for this kind. A trimesh request without geometry falls
    /// back to a unit cube.
    pub(crate) fn builder(self, geometry: Option<&Geometry>) -> Result<ColliderBuilder, PhysicsError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        match self {
            Self::Cuboid { size } => {
                if !(positive(size.x) && positive(size.y) && positive(size.z)) {
                    return Err(PhysicsError::InvalidShape(format!("cuboid size {size}")));
                }
                let half = size * 0.5;
                Ok(ColliderBuilder::cuboid(half.x, half.y, half.z))
            }
            Self::Ball { radius } => {
                if !positive(radius) {
                    return Err(PhysicsError::InvalidShape(format!("ball radius {radius}")));
                }
                Ok(ColliderBuilder::ball(radius))
            }
            Self::Capsule { half_height, radius } => {
                if !positive(radius) || !(half_height.is_finite() && half_height >= 0.0) {
                    return Err(PhysicsError::InvalidShape(format!(
                        "capsule half height {half_height}, radius {radius}"
                    )));
                }
                Ok(ColliderBuilder::capsule_y(half_height, radius))
            }
            Self::TriMesh => match geometry {
                Some(geometry) => {
                    let (vertices, indices) = trimesh_from_geometry(geometry)?;
                    Ok(ColliderBuilder::trimesh(vertices, indices))
                }
                None => {
                    tracing::warn!("node has no geometry, using default cuboid collider");
                    Ok(ColliderBuilder::cuboid(0.5, 0.5, 0.5))
                }
            },
        }
    }
}

/// Vertex and triangle buffers for a trimesh collider. Non-indexed geometry
/// gets a sequential index buffer.
pub fn trimesh_from_geometry(geometry: &Geometry) -> Result<(Vec<Point<Real>>, Vec<[u32; 3]>), PhysicsError> {
    let vertices: Vec<Point<Real>> = geometry
        .positions
        .iter()
        .map(|&[x, y, z]| Point::new(x, y, z))
        .collect();
    let flat = geometry.indices_or_sequential();
    if flat.len() % 3 != 0 {
        return Err(PhysicsError::InvalidTriMesh(format!(
            "{} indices is not a whole number of triangles",
            flat.len()
        )));
    }
    if flat.is_empty() {
        return Err(PhysicsError::InvalidTriMesh("no triangles".into()));
    }
    if let Some(bad) = flat.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(PhysicsError::InvalidTriMesh(format!(
            "index {bad} out of range for {} vertices",
            vertices.len()
        )));
    }
    let indices = flat.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
    Ok((vertices, indices))
}

/// Parameters for registering a scene node with the physics system.
///
/// `position` and `rotation` default to the node's current transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub kind: RigidBodyKind,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    /// Used only by dynamic bodies.
    pub mass: f32,
    pub restitution: f32,
    pub friction: f32,
    pub collider: ColliderKind,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            kind: RigidBodyKind::Dynamic,
            position: None,
            rotation: None,
            mass: 1.0,
            restitution: 0.2,
            friction: 0.5,
            collider: ColliderKind::TriMesh,
        }
    }
}

impl BodyConfig {
    pub fn fixed(collider: ColliderKind) -> Self {
        Self {
            kind: RigidBodyKind::Fixed,
            collider,
            ..Self::default()
        }
    }

    pub fn dynamic(collider: ColliderKind) -> Self {
        Self {
            collider,
            ..Self::default()
        }
    }

    pub fn kinematic(collider: ColliderKind) -> Self {
        Self {
            kind: RigidBodyKind::Kinematic,
            collider,
            ..Self::default()
        }
    }

    pub(crate) fn rigid_body(&self, position: Vec3, rotation: Quat) -> Result<RigidBodyBuilder, PhysicsError> {
        if self.kind == RigidBodyKind::Dynamic && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(PhysicsError::InvalidMass(self.mass));
        }
        Ok(self.kind.builder().position(crate::world::isometry(position, rotation)))
    }

    /// Collider for a node with `geometry`. Dynamic bodies take their whole
    /// mass from it.
    pub(crate) fn collider(&self, geometry: Option<&Geometry>) -> Result<ColliderBuilder, PhysicsError> {
        let builder = self
            .collider
            .builder(geometry)?
            .restitution(self.restitution)
            .friction(self.friction);
        Ok(match self.kind {
            RigidBodyKind::Dynamic => builder.mass(self.mass),
            _ => builder,
        })
    }
}
