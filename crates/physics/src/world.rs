use enigma_common::{BodyHandle, ColliderHandle};
use enigma_scene::PhysicsLink;
use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::na as nalgebra;
use rapier3d::prelude::{
    CCDSolver, Collider, ColliderBuilder, ColliderHandle as RapierColliderHandle, ColliderSet,
    DefaultBroadPhase, ImpulseJointSet, IntegrationParameters, IslandManager, Isometry,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryPipeline, Real, RigidBody,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, Vector, vector,
};
use std::fmt;

/// A Rapier world advanced in fixed timesteps.
///
/// Handles cross the crate boundary as the plain `u64` newtypes from
/// `enigma-common`, so the scene never depends on Rapier.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    queries: QueryPipeline,
    step_count: u64,
}

impl PhysicsWorld {
    pub const DEFAULT_TIMESTEP: f32 = 1.0 / 60.0;

    pub fn new(gravity: Vec3) -> Self {
        let params = IntegrationParameters {
            dt: Self::DEFAULT_TIMESTEP,
            ..IntegrationParameters::default()
        };
        Self {
            gravity: to_vector(gravity),
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            step_count: 0,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        to_vec3(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    pub fn timestep(&self) -> f32 {
        self.params.dt
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Insert a body with its single collider.
    pub fn insert(&mut self, body: RigidBodyBuilder, collider: ColliderBuilder) -> PhysicsLink {
        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        PhysicsLink {
            body: body_handle(body),
            collider: collider_handle(collider),
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(rapier_body(handle))
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(rapier_collider(handle))
    }

    pub fn translation(&self, handle: BodyHandle) -> Option<Vec3> {
        self.body(handle).map(|body| to_vec3(body.translation()))
    }

    pub fn rotation(&self, handle: BodyHandle) -> Option<Quat> {
        self.body(handle).map(|body| to_quat(body.rotation()))
    }

    pub fn linvel(&self, handle: BodyHandle) -> Option<Vec3> {
        self.body(handle).map(|body| to_vec3(body.linvel()))
    }

    /// Remove a body together with its collider.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies
            .remove(
                rapier_body(handle),
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    /// Add a force applied over the following steps, waking the body.
    pub fn add_force(&mut self, handle: BodyHandle, force: Vec3) -> bool {
        match self.bodies.get_mut(rapier_body(handle)) {
            Some(body) => {
                body.add_force(to_vector(force), true);
                true
            }
            None => false,
        }
    }

    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> bool {
        match self.bodies.get_mut(rapier_body(handle)) {
            Some(body) => {
                body.apply_impulse(to_vector(impulse), true);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        let handles: Vec<RigidBodyHandle> = self.bodies.iter().map(|(handle, _)| handle).collect();
        for handle in handles {
            self.bodies.remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    /// Advance the world by one fixed timestep.
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.queries),
            &(),
            &(),
        );
        self.step_count += 1;
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity())
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .field("step_count", &self.step_count)
            .finish_non_exhaustive()
    }
}

fn body_handle(handle: RigidBodyHandle) -> BodyHandle {
    let (index, generation) = handle.into_raw_parts();
    BodyHandle(u64::from(generation) << 32 | u64::from(index))
}

fn rapier_body(handle: BodyHandle) -> RigidBodyHandle {
    RigidBodyHandle::from_raw_parts(handle.0 as u32, (handle.0 >> 32) as u32)
}

fn collider_handle(handle: RapierColliderHandle) -> ColliderHandle {
    let (index, generation) = handle.into_raw_parts();
    ColliderHandle(u64::from(generation) << 32 | u64::from(index))
}

fn rapier_collider(handle: ColliderHandle) -> RapierColliderHandle {
    RapierColliderHandle::from_raw_parts(handle.0 as u32, (handle.0 >> 32) as u32)
}

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_quat(q: &UnitQuaternion<Real>) -> Quat {
    let c = q.quaternion().coords;
    Quat::from_xyzw(c.x, c.y, c.z, c.w)
}

pub(crate) fn isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let rotation = rotation.normalize();
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::new_normalize(Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BodyConfig, ColliderKind};

    fn add(world: &mut PhysicsWorld, config: BodyConfig, position: Vec3) -> PhysicsLink {
        let body = config.rigid_body(position, Quat::IDENTITY).unwrap();
        let collider = config.collider(None).unwrap();
        world.insert(body, collider)
    }

    fn floor(world: &mut PhysicsWorld) -> PhysicsLink {
        add(
            world,
            BodyConfig::fixed(ColliderKind::Cuboid {
                size: Vec3::new(20.0, 1.0, 20.0),
            }),
            Vec3::ZERO,
        )
    }

    #[test]
    fn free_fall_matches_gravity() {
        let mut world = PhysicsWorld::default();
        let ball = add(&mut world, BodyConfig::dynamic(ColliderKind::ball()), Vec3::Y * 100.0);
        for _ in 0..60 {
            world.step();
        }
        let v = world.linvel(ball.body).unwrap();
        assert!((v.y + 9.81).abs() < 0.05, "vy = {}", v.y);
        assert_eq!(world.step_count(), 60);
    }

    #[test]
    fn box_rests_flat_on_box() {
        let mut world = PhysicsWorld::default();
        floor(&mut world);
        let cube = add(
            &mut world,
            BodyConfig::dynamic(ColliderKind::cuboid()),
            Vec3::new(0.0, 3.0, 0.0),
        );
        for _ in 0..600 {
            world.step();
        }
        let y = world.translation(cube.body).unwrap().y;
        assert!((y - 1.0).abs() < 0.02, "cube centre rests at y = {y}");
        assert!(world.body(cube.body).unwrap().is_sleeping());
    }

    #[test]
    fn fixed_and_kinematic_bodies_ignore_gravity() {
        let mut world = PhysicsWorld::default();
        let fixed = floor(&mut world);
        let kinematic = add(&mut world, BodyConfig::kinematic(ColliderKind::ball()), Vec3::Y * 5.0);
        for _ in 0..60 {
            world.step();
        }
        assert_eq!(world.translation(fixed.body).unwrap(), Vec3::ZERO);
        assert_eq!(world.translation(kinematic.body).unwrap(), Vec3::Y * 5.0);
        assert!(world.body(fixed.body).unwrap().is_fixed());
    }

    #[test]
    fn impulse_changes_velocity_by_inverse_mass() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let config = BodyConfig {
            mass: 2.0,
            ..BodyConfig::dynamic(ColliderKind::ball())
        };
        let ball = add(&mut world, config, Vec3::ZERO);
        assert!(world.apply_impulse(ball.body, Vec3::new(4.0, 0.0, 0.0)));
        assert!(world.linvel(ball.body).unwrap().abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn force_wakes_sleeping_body() {
        let mut world = PhysicsWorld::default();
        floor(&mut world);
        let ball = add(&mut world, BodyConfig::dynamic(ColliderKind::ball()), Vec3::Y);
        for _ in 0..600 {
            world.step();
        }
        assert!(world.body(ball.body).unwrap().is_sleeping());
        world.add_force(ball.body, Vec3::new(0.0, 100.0, 0.0));
        assert!(!world.body(ball.body).unwrap().is_sleeping());
        world.step();
        assert!(world.linvel(ball.body).unwrap().y > 0.0);
    }

    #[test]
    fn remove_body_drops_collider() {
        let mut world = PhysicsWorld::default();
        let ball = add(&mut world, BodyConfig::dynamic(ColliderKind::ball()), Vec3::Y);
        assert_eq!(world.collider_count(), 1);
        assert!(world.collider(ball.collider).is_some());
        assert!(world.remove_body(ball.body));
        assert_eq!(world.collider_count(), 0);
        assert!(!world.remove_body(ball.body));
    }

    #[test]
    fn handles_survive_the_u64_round_trip() {
        let mut world = PhysicsWorld::default();
        let first = add(&mut world, BodyConfig::dynamic(ColliderKind::ball()), Vec3::ZERO);
        world.remove_body(first.body);
        // Reuses the slot with a new generation.
        let second = add(&mut world, BodyConfig::dynamic(ColliderKind::ball()), Vec3::X);
        assert_ne!(first.body, second.body);
        assert!(world.body(first.body).is_none());
        assert_eq!(world.translation(second.body), Some(Vec3::X));
    }

    #[test]
    fn identical_worlds_step_identically() {
        let build = || {
            let mut w = PhysicsWorld::default();
            floor(&mut w);
            let balls: Vec<_> = (0..5)
                .map(|i| {
                    add(
                        &mut w,
                        BodyConfig::dynamic(ColliderKind::ball()),
                        Vec3::new(i as f32 * 0.3, 2.0 + i as f32, 0.0),
                    )
                })
                .collect();
            (w, balls)
        };
        let ((mut a, balls_a), (mut b, balls_b)) = (build(), build());
        for _ in 0..200 {
            a.step();
            b.step();
        }
        let pa: Vec<_> = balls_a.iter().map(|l| a.translation(l.body)).collect();
        let pb: Vec<_> = balls_b.iter().map(|l| b.translation(l.body)).collect();
        assert_eq!(pa, pb);
    }
}
