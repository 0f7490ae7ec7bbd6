use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;
use tracing::{debug, warn};

use super::scene::{EntityId, SceneWorld};

pub const DEFAULT_GRAVITY_Y: f32 = -9.82;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Ball { radius: f32 },
    Cuboid { half_extents: Vec3 },
    ConvexPoints { points: Vec<Vec3> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyDesc {
    pub entity: EntityId,
    pub position: Vec3,
    pub rotation: Quat,
    pub mass: f32,
    pub shape: ColliderShape,
}

/// Rigid-body simulation owned by a scene.
///
/// Dynamic bodies are bound to scene entities; [`PhysicsWorld::sync_into`]
/// copies body poses onto those entities after each step.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    bindings: Vec<(EntityId, BodyHandle)>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, DEFAULT_GRAVITY_Y, 0.0))
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity: vector![gravity.x, gravity.y, gravity.z],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            bindings: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    /// Static infinite plane facing +Y.
    pub fn add_ground_plane(&mut self, height: f32) {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![0.0, height, 0.0])
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::halfspace(Vector::y_axis()).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
    }

    pub fn add_dynamic_body(&mut self, desc: RigidBodyDesc) -> BodyHandle {
        let rotation = to_rapier_rotation(desc.rotation);
        let isometry = Isometry::from_parts(
            Translation::new(desc.position.x, desc.position.y, desc.position.z),
            rotation,
        );
        let body = RigidBodyBuilder::dynamic().position(isometry).build();
        let handle = self.bodies.insert(body);

        let collider = collider_for_shape(&desc.shape)
            .mass(desc.mass.max(f32::EPSILON))
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        let body_handle = BodyHandle(handle);
        self.bindings.push((desc.entity, body_handle));
        debug!(entity = desc.entity.0, mass = desc.mass, "physics_body_added");
        body_handle
    }

    pub fn body_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn step(&mut self, dt_seconds: f32) {
        if !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt_seconds;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    pub fn body_pose(&self, handle: BodyHandle) -> Option<(Vec3, Quat)> {
        let body = self.bodies.get(handle.0)?;
        let t = body.translation();
        let r = body.rotation();
        Some((Vec3::new(t.x, t.y, t.z), Quat::from_xyzw(r.i, r.j, r.k, r.w)))
    }

    pub fn sync_into(&self, world: &mut SceneWorld) {
        for (entity_id, handle) in &self.bindings {
            let Some((position, rotation)) = self.body_pose(*handle) else {
                continue;
            };
            match world.find_entity_mut(*entity_id) {
                Some(entity) => {
                    entity.transform.position = position;
                    entity.transform.rotation = rotation;
                }
                None => warn!(entity = entity_id.0, "physics_entity_missing"),
            }
        }
    }
}

fn collider_for_shape(shape: &ColliderShape) -> ColliderBuilder {
    match shape {
        ColliderShape::Ball { radius } => ColliderBuilder::ball(radius.max(f32::EPSILON)),
        ColliderShape::Cuboid { half_extents } => ColliderBuilder::cuboid(
            half_extents.x.max(f32::EPSILON),
            half_extents.y.max(f32::EPSILON),
            half_extents.z.max(f32::EPSILON),
        ),
        ColliderShape::ConvexPoints { points } => {
            let hull_points: Vec<Point<Real>> =
                points.iter().map(|p| point![p.x, p.y, p.z]).collect();
            match ColliderBuilder::convex_hull(&hull_points) {
                Some(builder) => builder,
                None => {
                    let radius = points
                        .iter()
                        .map(|p| p.length())
                        .fold(0.0_f32, f32::max)
                        .max(0.5);
                    warn!(point_count = points.len(), radius, "convex_hull_degenerate");
                    ColliderBuilder::ball(radius)
                }
            }
        }
    }
}

fn to_rapier_rotation(rotation: Quat) -> UnitQuaternion<Real> {
    let rotation = if rotation.is_finite() && rotation.length_squared() > f32::EPSILON {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };
    UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w, rotation.x, rotation.y, rotation.z,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::environment::MaterialId;
    use crate::app::scene::{PropShape, RenderableDesc, RenderableKind, Transform};

    fn spawn_marker(world: &mut SceneWorld, position: Vec3) -> EntityId {
        let id = world.spawn(
            Transform::from_position(position),
            RenderableDesc::new(
                RenderableKind::Prop {
                    shape: PropShape::Sphere { radius: 0.5 },
                    material: MaterialId(0),
                },
                "body",
            ),
        );
        world.apply_pending();
        id
    }

    #[test]
    fn dynamic_ball_falls_and_rests_on_ground() {
        let mut world = SceneWorld::default();
        let entity = spawn_marker(&mut world, Vec3::new(0.0, 4.0, 0.0));
        let mut physics = PhysicsWorld::default();
        physics.add_ground_plane(0.0);
        let handle = physics.add_dynamic_body(RigidBodyDesc {
            entity,
            position: Vec3::new(0.0, 4.0, 0.0),
            rotation: Quat::IDENTITY,
            mass: 1.0,
            shape: ColliderShape::Ball { radius: 0.5 },
        });

        physics.step(1.0 / 60.0);
        let (after_one_step, _) = physics.body_pose(handle).expect("body");
        assert!(after_one_step.y < 4.0);

        for _ in 0..600 {
            physics.step(1.0 / 60.0);
        }
        let (rest, _) = physics.body_pose(handle).expect("body");
        assert!((rest.y - 0.5).abs() < 0.1, "rest height {}", rest.y);

        physics.sync_into(&mut world);
        let synced = world.find_entity(entity).expect("entity").transform.position;
        assert!((synced - rest).length() < 1e-5);
    }

    #[test]
    fn convex_body_is_registered_and_bound() {
        let mut physics = PhysicsWorld::default();
        let corners: Vec<Vec3> = [-1.0_f32, 1.0]
            .iter()
            .flat_map(|&x| [-1.0_f32, 1.0].map(move |y| (x, y)))
            .flat_map(|(x, y)| [-1.0_f32, 1.0].map(move |z| Vec3::new(x, y, z) * 0.5))
            .collect();
        let handle = physics.add_dynamic_body(RigidBodyDesc {
            entity: EntityId(1),
            position: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::from_rotation_y(0.3),
            mass: 1.0,
            shape: ColliderShape::ConvexPoints { points: corners },
        });
        assert_eq!(physics.body_count(), 1);
        let (position, rotation) = physics.body_pose(handle).expect("body");
        assert!((position.y - 2.0).abs() < 1e-6);
        assert!(rotation.angle_between(Quat::from_rotation_y(0.3)) < 1e-4);
    }

    #[test]
    fn non_positive_step_is_ignored() {
        let mut physics = PhysicsWorld::default();
        let handle = physics.add_dynamic_body(RigidBodyDesc {
            entity: EntityId(1),
            position: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::IDENTITY,
            mass: 1.0,
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::splat(0.5),
            },
        });
        physics.step(0.0);
        physics.step(f32::NAN);
        let (position, _) = physics.body_pose(handle).expect("body");
        assert!((position.y - 2.0).abs() < 1e-6);
    }
}
