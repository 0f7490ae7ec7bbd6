use std::f32::consts::TAU;
use std::path::Path;

use engine::{
    ActorLoadRequest, ClipRequest, ClipRequestSource, ClipSource, ColliderShape, PhysicsWorld,
    PropManifest, PropShape, PropShapeManifest, Quat, RenderableDesc, RenderableKind,
    RigidBodyDesc, SceneWorld, StageManifest, ToneMap, Transform, Vec3,
};
use tracing::{info, warn};

use super::navigation::NavigationConfig;
use super::state::{ActorSpawn, StageProp, StageState};

const TORUS_KNOT_P: f32 = 2.0;
const TORUS_KNOT_Q: f32 = 3.0;
const TORUS_KNOT_HULL_SAMPLES: usize = 64;

pub(crate) struct StageAssembly {
    pub state: StageState,
    pub load_requests: Vec<ActorLoadRequest>,
}

/// Builds the static part of a stage: environment, props and physics bodies.
/// Actors are only described here; they arrive later from the loader.
pub(crate) fn assemble_stage(
    manifest: &StageManifest,
    assets_dir: &Path,
    world: &mut SceneWorld,
) -> StageAssembly {
    configure_environment(manifest, assets_dir, world);

    let spawns = manifest
        .actors
        .iter()
        .map(|actor| ActorSpawn {
            name: actor.name.clone(),
            scale: actor.scale,
            position: Vec3::from(actor.position),
            locomotion: actor.locomotion.clone(),
            start_clip: actor.start_clip.clone(),
        })
        .collect();
    let mut state = StageState::new(
        spawns,
        manifest.selection,
        manifest.arrival,
        NavigationConfig::default(),
    );

    if manifest.physics {
        let mut physics = PhysicsWorld::default();
        physics.add_ground_plane(state.ground.height);
        state.physics = Some(physics);
    }

    for prop in &manifest.props {
        if let Some(stage_prop) = spawn_prop(prop, world, state.physics.as_mut()) {
            state.props.push(stage_prop);
        }
    }

    let load_requests = manifest
        .actors
        .iter()
        .enumerate()
        .map(|(slot, actor)| ActorLoadRequest {
            slot,
            name: actor.name.clone(),
            model_path: assets_dir.join(&actor.model),
            clips: actor
                .clips
                .iter()
                .map(|clip| ClipRequest {
                    name: clip.name.clone(),
                    source: match &clip.source {
                        ClipSource::Embedded { embedded } => ClipRequestSource::Embedded(*embedded),
                        ClipSource::File { file } => ClipRequestSource::File(assets_dir.join(file)),
                    },
                })
                .collect(),
            material_bindings: actor
                .materials
                .iter()
                .map(|binding| (binding.mesh.clone(), binding.material.clone()))
                .collect(),
        })
        .collect();

    info!(
        stage = %manifest.name,
        props = state.props.len(),
        actors = manifest.actors.len(),
        physics_bodies = state.physics.as_ref().map_or(0, PhysicsWorld::body_count),
        "stage_assembled"
    );
    StageAssembly {
        state,
        load_requests,
    }
}

fn configure_environment(manifest: &StageManifest, assets_dir: &Path, world: &mut SceneWorld) {
    let environment = world.environment_mut();
    for material in &manifest.materials {
        environment.add_material(material.name.clone(), material.color);
    }
    if let Some(tone_map) = &manifest.tone_map {
        environment.tone_map = ToneMap::load_or_fallback(&assets_dir.join(tone_map));
    }

    let lighting = &manifest.lighting;
    if let Some(intensity) = lighting.ambient_intensity {
        environment.ambient_intensity = intensity.clamp(0.0, 1.0);
    }
    if let Some(intensity) = lighting.directional_intensity {
        environment.sun.intensity = intensity.clamp(0.0, 1.0);
    }
    if let Some(position) = lighting.directional_position {
        environment.sun.position = Vec3::from(position);
    }

    let background = &manifest.background;
    if let Some(colors) = &background.gradient {
        for (index, color) in colors.iter().enumerate() {
            environment.set_background_color(index, *color);
        }
    }
    if let Some(scene_color) = background.scene_color {
        environment.scene_color = scene_color;
    }
}

fn spawn_prop(
    prop: &PropManifest,
    world: &mut SceneWorld,
    physics: Option<&mut PhysicsWorld>,
) -> Option<StageProp> {
    let Some(material) = world.environment().material_id(&prop.material) else {
        warn!(prop = %prop.name, material = %prop.material, "prop_material_missing");
        return None;
    };
    let shape = prop_shape(prop.shape);
    let position = Vec3::from(prop.position);
    let entity = world.spawn(
        Transform::from_position(position),
        RenderableDesc::new(RenderableKind::Prop { shape, material }, prop.name.clone()),
    );

    let body = match (physics, prop.mass) {
        (Some(physics), Some(mass)) => Some(physics.add_dynamic_body(RigidBodyDesc {
            entity,
            position,
            rotation: Quat::IDENTITY,
            mass,
            shape: collider_shape(shape),
        })),
        _ => None,
    };

    Some(StageProp {
        name: prop.name.clone(),
        entity,
        shape,
        body,
    })
}

pub(crate) fn prop_shape(shape: PropShapeManifest) -> PropShape {
    match shape {
        PropShapeManifest::Box { size } => PropShape::Box {
            half_extents: Vec3::splat(size * 0.5),
        },
        PropShapeManifest::Sphere { radius } => PropShape::Sphere { radius },
        PropShapeManifest::Icosahedron { radius } => PropShape::Icosahedron { radius },
        PropShapeManifest::TorusKnot { radius, tube } => PropShape::TorusKnot { radius, tube },
    }
}

/// Collision shape for a dynamic prop. Non-convex shapes use their hull.
pub(crate) fn collider_shape(shape: PropShape) -> ColliderShape {
    match shape {
        PropShape::Box { half_extents } => ColliderShape::Cuboid { half_extents },
        PropShape::Sphere { radius } => ColliderShape::Ball { radius },
        PropShape::Icosahedron { radius } => ColliderShape::ConvexPoints {
            points: icosahedron_vertices(radius),
        },
        PropShape::TorusKnot { radius, tube } => ColliderShape::ConvexPoints {
            points: torus_knot_hull_points(radius, tube),
        },
    }
}

pub(crate) fn icosahedron_vertices(radius: f32) -> Vec<Vec3> {
    let phi = (1.0 + 5.0_f32.sqrt()) * 0.5;
    let mut vertices = Vec::with_capacity(12);
    for a in [-1.0, 1.0] {
        for b in [-phi, phi] {
            vertices.push(Vec3::new(a, b, 0.0));
            vertices.push(Vec3::new(0.0, a, b));
            vertices.push(Vec3::new(b, 0.0, a));
        }
    }
    vertices
        .into_iter()
        .map(|vertex| vertex.normalize() * radius)
        .collect()
}

/// Samples the (2, 3) torus knot centerline and pads each sample by the tube
/// radius along the axes.
pub(crate) fn torus_knot_hull_points(radius: f32, tube: f32) -> Vec<Vec3> {
    let offsets = [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ];
    let mut points = Vec::with_capacity(TORUS_KNOT_HULL_SAMPLES * offsets.len());
    for sample in 0..TORUS_KNOT_HULL_SAMPLES {
        let u = sample as f32 / TORUS_KNOT_HULL_SAMPLES as f32 * TORUS_KNOT_P * TAU;
        let center = torus_knot_point(u, radius);
        points.extend(offsets.iter().map(|offset| center + *offset * tube));
    }
    points
}

fn torus_knot_point(u: f32, radius: f32) -> Vec3 {
    let q_over_p = TORUS_KNOT_Q / TORUS_KNOT_P * u;
    let ring = radius * (2.0 + q_over_p.cos()) * 0.5;
    Vec3::new(
        ring * u.cos(),
        ring * u.sin(),
        radius * q_over_p.sin() * 0.5,
    )
}
