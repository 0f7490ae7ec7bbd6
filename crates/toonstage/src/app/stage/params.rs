use std::f32::consts::TAU;

use engine::{ParamError, ParamSet, Quat, SceneWorld};
use glam::EulerRot;
use tracing::{debug, warn};

use super::state::StageState;

pub(crate) const CUBE_PROP: &str = "cube";
pub(crate) const TOON_MATERIAL: &str = "toon";
pub(crate) const TOON_JOINTS_MATERIAL: &str = "toon_joints";

const CUBE_ROTATION: [&str; 3] = ["CubeRotationX", "CubeRotationY", "CubeRotationZ"];
const SHADOW_LEFT: &str = "ShadowLeft";
const SHADOW_RIGHT: &str = "ShadowRight";
const SHADOW_TOP: &str = "ShadowTop";
const SHADOW_BOTTOM: &str = "ShadowBottom";
const SHADOW_NEAR: &str = "ShadowNear";
const SHADOW_FAR: &str = "ShadowFar";
const LIGHT_POSITION: [&str; 3] = ["LightX", "LightY", "LightZ"];
const LIGHT_INTENSITY: &str = "LightIntensity";
const AMBIENT_INTENSITY: &str = "AmbientIntensity";
const CAMERA_Z: &str = "CameraZ";
const TOON_COLOR: &str = "ToonColor";
const TOON_JOINTS_COLOR: &str = "ToonJointsColor";
const OUTLINE: [&str; 3] = ["OutlineR", "OutlineG", "OutlineB"];
const SHADOW_COLOR: &str = "ShadowColor";
const SCENE_COLOR: &str = "SceneColor";
const BACKGROUND_COLORS: [&str; 4] = ["BGColor1", "BGColor2", "BGColor3", "BGColor4"];

/// Parameter panel contents, seeded from the live scene so the first frame
/// shows the values actually in use.
pub(crate) fn build_param_set(world: &SceneWorld, state: &StageState) -> Result<ParamSet, ParamError> {
    let mut params = ParamSet::new();
    let environment = world.environment();

    if let Some(cube) = state.prop(CUBE_PROP) {
        let (x, y, z) = world
            .find_entity(cube.entity)
            .map(|entity| entity.transform.rotation.to_euler(EulerRot::XYZ))
            .unwrap_or_default();
        for (name, value) in CUBE_ROTATION.into_iter().zip([x, y, z]) {
            params.add_number("cube rotation", name, 0.0, TAU, 0.0, value.rem_euclid(TAU))?;
        }
    }

    let sun = &environment.sun;
    let folder = "DirectionalLight";
    params.add_number(folder, SHADOW_LEFT, -100.0, 100.0, 0.1, sun.shadow_left)?;
    params.add_number(folder, SHADOW_RIGHT, -100.0, 100.0, 0.1, sun.shadow_right)?;
    params.add_number(folder, SHADOW_TOP, -100.0, 100.0, 0.1, sun.shadow_top)?;
    params.add_number(folder, SHADOW_BOTTOM, -100.0, 100.0, 0.1, sun.shadow_bottom)?;
    params.add_number(folder, SHADOW_NEAR, 0.1, 100.0, 0.0, sun.shadow_near)?;
    params.add_number(folder, SHADOW_FAR, 0.1, 100.0, 0.0, sun.shadow_far)?;
    for (name, value) in LIGHT_POSITION.into_iter().zip(sun.position.to_array()) {
        params.add_number(folder, name, -50.0, 50.0, 0.01, value)?;
    }
    params.add_number(folder, LIGHT_INTENSITY, 0.0, 1.0, 0.01, sun.intensity)?;

    params.add_number(
        "AmbientLight",
        AMBIENT_INTENSITY,
        0.0,
        1.0,
        0.01,
        environment.ambient_intensity,
    )?;
    params.add_number("camera", CAMERA_Z, 0.0, 20.0, 0.0, world.camera().eye().z)?;

    let folder = "Material";
    for (param, material) in [(TOON_COLOR, TOON_MATERIAL), (TOON_JOINTS_COLOR, TOON_JOINTS_MATERIAL)] {
        let color = environment
            .material_id(material)
            .and_then(|id| environment.material(id))
            .map(|material| material.color);
        if let Some(color) = color {
            params.add_color(folder, param, color)?;
        }
    }
    for (name, value) in OUTLINE.into_iter().zip(environment.outline_color.to_array()) {
        params.add_number(folder, name, 0.0, 1.0, 0.01, value)?;
    }
    params.add_color(folder, SHADOW_COLOR, environment.shadow_color)?;

    params.add_color("SceneColor", SCENE_COLOR, environment.scene_color)?;

    for (index, name) in BACKGROUND_COLORS.into_iter().enumerate() {
        if let Some(color) = environment.background.color(index) {
            params.add_color("Background Gradient Customization", name, color)?;
        }
    }

    // Seeding is not a change.
    params.drain_dirty();
    Ok(params)
}

/// Pushes every value written since the last call into the scene.
pub(crate) fn apply_dirty_params(
    params: &mut ParamSet,
    world: &mut SceneWorld,
    state: &StageState,
) -> usize {
    let dirty = params.drain_dirty();
    for name in &dirty {
        if apply_param(params, name, world, state) {
            let value = params.get(name).map(|value| value.display());
            debug!(param = %name, value = ?value, "param_applied");
        } else {
            warn!(param = %name, "param_binding_missing");
        }
    }
    dirty.len()
}

fn apply_param(params: &ParamSet, name: &str, world: &mut SceneWorld, state: &StageState) -> bool {
    if CUBE_ROTATION.contains(&name) {
        let Some(cube) = state.prop(CUBE_PROP) else {
            return false;
        };
        let [x, y, z] = CUBE_ROTATION.map(|axis| params.number(axis).unwrap_or(0.0));
        return match world.find_entity_mut(cube.entity) {
            Some(entity) => {
                entity.transform.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
                true
            }
            None => false,
        };
    }
    if name == CAMERA_Z {
        let Some(z) = params.number(name) else {
            return false;
        };
        world.camera_mut().set_eye_z(z);
        return true;
    }

    let environment = world.environment_mut();
    if let Some(index) = BACKGROUND_COLORS.iter().position(|candidate| *candidate == name) {
        return params
            .color(name)
            .is_some_and(|color| environment.set_background_color(index, color));
    }
    if let Some(axis) = LIGHT_POSITION.iter().position(|candidate| *candidate == name) {
        let Some(value) = params.number(name) else {
            return false;
        };
        environment.sun.position[axis] = value;
        return true;
    }
    if let Some(axis) = OUTLINE.iter().position(|candidate| *candidate == name) {
        let Some(value) = params.number(name) else {
            return false;
        };
        environment.outline_color[axis] = value;
        return true;
    }

    match name {
        TOON_COLOR | TOON_JOINTS_COLOR => {
            let material = if name == TOON_COLOR {
                TOON_MATERIAL
            } else {
                TOON_JOINTS_MATERIAL
            };
            match (environment.material_id(material), params.color(name)) {
                (Some(id), Some(color)) => environment.set_material_color(id, color),
                _ => false,
            }
        }
        SHADOW_COLOR => params
            .color(name)
            .map(|color| environment.shadow_color = color)
            .is_some(),
        SCENE_COLOR => params
            .color(name)
            .map(|color| environment.scene_color = color)
            .is_some(),
        _ => {
            let Some(value) = params.number(name) else {
                return false;
            };
            let sun = &mut environment.sun;
            let slot = match name {
                SHADOW_LEFT => &mut sun.shadow_left,
                SHADOW_RIGHT => &mut sun.shadow_right,
                SHADOW_TOP => &mut sun.shadow_top,
                SHADOW_BOTTOM => &mut sun.shadow_bottom,
                SHADOW_NEAR => &mut sun.shadow_near,
                SHADOW_FAR => &mut sun.shadow_far,
                LIGHT_INTENSITY => &mut sun.intensity,
                AMBIENT_INTENSITY => &mut environment.ambient_intensity,
                _ => return false,
            };
            *slot = value;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use engine::{
        ArrivalBehavior, EntityId, MaterialId, PropShape, RenderableDesc, RenderableKind,
        SelectionMode, Transform, Vec3,
    };

    use super::super::navigation::NavigationConfig;
    use super::super::state::StageProp;
    use super::*;

    fn stage_with_cube() -> (SceneWorld, StageState) {
        let mut world = SceneWorld::default();
        let toon = world.environment_mut().add_material(TOON_MATERIAL, 0x18BFE3);
        let shape = PropShape::Box {
            half_extents: Vec3::splat(0.5),
        };
        let entity = world.spawn(
            Transform::from_position(Vec3::new(-3.0, 3.0, 0.0)),
            RenderableDesc::new(
                RenderableKind::Prop {
                    shape,
                    material: toon,
                },
                CUBE_PROP,
            ),
        );
        world.apply_pending();
        let mut state = StageState::new(
            Vec::new(),
            SelectionMode::Auto,
            ArrivalBehavior::Idle,
            NavigationConfig::default(),
        );
        state.props.push(StageProp {
            name: CUBE_PROP.to_string(),
            entity,
            shape,
            body: None,
        });
        (world, state)
    }

    fn cube_entity(state: &StageState) -> EntityId {
        state.prop(CUBE_PROP).expect("cube").entity
    }

    #[test]
    fn seeded_params_mirror_scene_and_start_clean() {
        let (world, state) = stage_with_cube();
        let mut params = build_param_set(&world, &state).expect("params");

        assert!((params.number(CAMERA_Z).expect("camera") - 15.0).abs() < 1e-3);
        assert!((params.number(AMBIENT_INTENSITY).expect("ambient") - 0.16).abs() < 1e-4);
        assert_eq!(params.color(TOON_COLOR), Some(0x18BFE3));
        assert!(params.get(TOON_JOINTS_COLOR).is_none());
        assert_eq!(params.color("BGColor1"), Some(0x1B1D1E));
        assert!(params.drain_dirty().is_empty());
        assert_eq!(
            params.folders(),
            vec![
                "cube rotation",
                "DirectionalLight",
                "AmbientLight",
                "camera",
                "Material",
                "SceneColor",
                "Background Gradient Customization"
            ]
        );
    }

    #[test]
    fn written_values_reach_the_environment() {
        let (mut world, state) = stage_with_cube();
        let mut params = build_param_set(&world, &state).expect("params");

        params.set_from_str(TOON_COLOR, "#ff0000").expect("toon");
        params.set_number("LightY", 12.3).expect("light");
        params.set_number(AMBIENT_INTENSITY, 3.0).expect("ambient");
        params.set_number("OutlineG", 0.5).expect("outline");
        params.set_from_str("BGColor2", "#00ff00").expect("bg");
        params.set_number(SHADOW_LEFT, -20.0).expect("shadow");
        assert_eq!(apply_dirty_params(&mut params, &mut world, &state), 6);

        let environment = world.environment();
        assert_eq!(environment.material(MaterialId(0)).map(|m| m.color), Some(0xFF0000));
        assert!((environment.sun.position.y - 12.3).abs() < 1e-3);
        assert_eq!(environment.ambient_intensity, 1.0);
        assert!((environment.outline_color.y - 0.5).abs() < 1e-6);
        assert_eq!(environment.background.color(1), Some(0x00FF00));
        assert!((environment.sun.shadow_left + 20.0).abs() < 1e-3);
        assert_eq!(apply_dirty_params(&mut params, &mut world, &state), 0);
    }

    #[test]
    fn cube_rotation_and_camera_params_move_the_scene() {
        let (mut world, state) = stage_with_cube();
        let mut params = build_param_set(&world, &state).expect("params");

        params.set_number("CubeRotationY", 1.0).expect("rotation");
        params.set_number(CAMERA_Z, 18.0).expect("camera");
        apply_dirty_params(&mut params, &mut world, &state);

        let rotation = world
            .find_entity(cube_entity(&state))
            .expect("cube")
            .transform
            .rotation;
        assert!((rotation.angle_between(Quat::from_rotation_y(1.0))).abs() < 1e-4);
        assert!((world.camera().eye().z - 18.0).abs() < 1e-3);
    }

    #[test]
    fn stage_without_cube_skips_rotation_folder() {
        let world = SceneWorld::default();
        let state = StageState::new(
            Vec::new(),
            SelectionMode::Explicit,
            ArrivalBehavior::Stop,
            NavigationConfig::default(),
        );
        let params = build_param_set(&world, &state).expect("params");
        assert!(params.get("CubeRotationX").is_none());
        assert!(!params.folders().contains(&"cube rotation"));
    }
}
