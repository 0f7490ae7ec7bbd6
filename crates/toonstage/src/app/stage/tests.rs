use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use engine::{
    parse_stage_manifest, AnimationClip, AssetEvent, InputAction, InputSnapshot, LoadedActor,
    ModelAsset, PartMaterial, PointerEventKind, RenderableKind, Scene, SceneCommand,
    SceneDebugCommand, SceneDebugCommandResult, SceneKey, SceneWorld, StageLoader,
    TweenCompletion, Vec2, Vec3,
};

use super::navigation::{
    complete_navigation, ClickOutcome, IgnoredClick, Locomotion, NavigationRequest,
    RUN_SECONDS_PER_UNIT, WALK_SECONDS_PER_UNIT,
};
use super::orientation::rotation_angle;
use super::roster::{Actor, ActorId, ActorSlot};
use super::{StageScene, StageSource};

const WINDOW: (u32, u32) = (1280, 720);
const DT: f32 = 0.1;
const POSITION_TOLERANCE: f32 = 1.0e-2;

const SINGLE_STAGE: &str = r##"{
    "name": "single",
    "materials": [
        { "name": "toon", "color": "#18bfe3" },
        { "name": "toon_joints", "color": "#1c5b72" }
    ],
    "actors": [{
        "name": "beta",
        "model": "models/beta.glb",
        "clips": [
            { "name": "default", "embedded": 0 },
            { "name": "cheering", "file": "models/cheering.glb" },
            { "name": "standing", "file": "models/standing.glb" },
            { "name": "running", "file": "models/running.glb" },
            { "name": "walking", "file": "models/walking.glb" }
        ],
        "materials": [
            { "mesh": "Beta_Surface", "material": "toon" },
            { "mesh": "Beta_Joints", "material": "toon_joints" }
        ],
        "start_clip": "standing"
    }],
    "props": [
        { "name": "cube", "shape": { "kind": "box", "size": 1.0 },
          "position": [-3.0, 3.0, 0.0], "material": "toon" }
    ]
}"##;

const SPIDER_STAGE: &str = r##"{
    "name": "spiders",
    "selection": "explicit",
    "arrival": "stop",
    "materials": [{ "name": "toon", "color": "#18bfe3" }],
    "actors": [
        {
            "name": "spider_left",
            "model": "models/spider.glb",
            "position": [-4.0, 0.0, 0.0],
            "clips": [{ "name": "walk", "embedded": 0 }],
            "locomotion": { "idle": null, "walk": "walk", "run": "walk" }
        },
        {
            "name": "spider_right",
            "model": "models/spider.glb",
            "position": [4.0, 0.0, 0.0],
            "clips": [{ "name": "walk", "embedded": 0 }],
            "locomotion": { "idle": null, "walk": "walk", "run": "walk" }
        },
        {
            "name": "spider_broken",
            "model": "models/missing.glb",
            "position": [0.0, 0.0, -4.0],
            "clips": [{ "name": "walk", "embedded": 0 }],
            "locomotion": { "idle": null, "walk": "walk", "run": "walk" }
        }
    ]
}"##;

fn stage_from(raw: &str) -> (StageScene, SceneWorld) {
    let manifest = parse_stage_manifest(raw, Path::new("test_stage.json")).expect("manifest");
    let mut scene = StageScene::new(
        "A",
        StageSource::Manifest(Box::new(manifest)),
        PathBuf::from("/nonexistent/assets"),
        SceneKey::B,
    );
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    // Actors are delivered by hand below.
    scene.loader = None;
    (scene, world)
}

fn loaded_actor(slot: usize, name: &str, clips: &[(&str, f32)]) -> LoadedActor {
    LoadedActor {
        slot,
        name: name.to_string(),
        model: ModelAsset {
            path: PathBuf::from(format!("{name}.glb")),
            mesh_names: vec!["Beta_Surface".to_string(), "Beta_Joints".to_string()],
            bounds_min: Vec3::new(-0.4, 0.0, -0.4),
            bounds_max: Vec3::new(0.4, 1.8, 0.4),
            clips: Vec::new(),
        },
        clips: clips
            .iter()
            .map(|(clip, duration)| AnimationClip::new(*clip, *duration))
            .collect(),
        parts: vec![
            PartMaterial {
                mesh_name: "Beta_Surface".to_string(),
                material: Some("toon".to_string()),
            },
            PartMaterial {
                mesh_name: "Beta_Joints".to_string(),
                material: Some("toon_joints".to_string()),
            },
        ],
    }
}

fn deliver(scene: &mut StageScene, world: &mut SceneWorld, event: AssetEvent) {
    scene
        .state
        .as_mut()
        .expect("stage loaded")
        .handle_asset_event(event, world);
    world.apply_pending();
}

fn beta() -> LoadedActor {
    loaded_actor(
        0,
        "beta",
        &[
            ("default", 1.0),
            ("cheering", 2.0),
            ("standing", 2.5),
            ("running", 0.7),
            ("walking", 1.1),
        ],
    )
}

fn single_stage() -> (StageScene, SceneWorld) {
    let (mut scene, mut world) = stage_from(SINGLE_STAGE);
    deliver(&mut scene, &mut world, AssetEvent::ActorLoaded(beta()));
    deliver(&mut scene, &mut world, AssetEvent::AllSettled);
    (scene, world)
}

fn spider_stage() -> (StageScene, SceneWorld) {
    let (mut scene, mut world) = stage_from(SPIDER_STAGE);
    for (slot, name) in [(0, "spider_left"), (1, "spider_right")] {
        let spider = loaded_actor(slot, name, &[("walk", 0.8)]);
        deliver(&mut scene, &mut world, AssetEvent::ActorLoaded(spider));
    }
    deliver(
        &mut scene,
        &mut world,
        AssetEvent::ActorFailed {
            slot: 2,
            name: "spider_broken".to_string(),
            reason: "model not found".to_string(),
        },
    );
    deliver(&mut scene, &mut world, AssetEvent::AllSettled);
    (scene, world)
}

fn frame() -> InputSnapshot {
    InputSnapshot::empty().with_window_size(WINDOW)
}

fn screen_point(world: &SceneWorld, point: Vec3) -> Vec2 {
    world
        .camera()
        .project_to_screen(point, WINDOW)
        .map(|(px, _)| px)
        .expect("point in front of camera")
}

fn pointer_at(world: &SceneWorld, point: Vec3, kind: PointerEventKind) -> InputSnapshot {
    frame().with_pointer_event(kind, screen_point(world, point))
}

fn run_frames(scene: &mut StageScene, world: &mut SceneWorld, frames: usize) {
    for _ in 0..frames {
        scene.update(DT, &frame(), world);
    }
}

fn actor(scene: &StageScene, slot: usize) -> &Actor {
    scene
        .state
        .as_ref()
        .expect("stage loaded")
        .roster
        .get(ActorId(slot))
        .expect("ready actor")
}

fn request(scene: &StageScene, slot: usize) -> Option<NavigationRequest> {
    scene
        .state
        .as_ref()
        .expect("stage loaded")
        .requests
        .get(&ActorId(slot))
        .copied()
}

fn success(result: SceneDebugCommandResult) -> String {
    match result {
        SceneDebugCommandResult::Success(text) => text,
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn loaded_actor_starts_standing_and_is_auto_selected() {
    let (scene, world) = single_stage();
    let beta = actor(&scene, 0);

    assert_eq!(beta.active_clip(), Some("standing"));
    assert_eq!(beta.position, Vec3::ZERO);
    assert_eq!(scene.state.as_ref().and_then(|state| state.selected), Some(ActorId(0)));
    let entity = world.find_entity(beta.entity).expect("figure entity");
    match &entity.renderable.kind {
        RenderableKind::Figure { height, parts, .. } => {
            assert!((height - 1.8).abs() < 1e-5);
            assert_eq!(parts.len(), 2);
            assert!(parts.iter().all(|part| part.material.is_some()));
        }
        other => panic!("expected figure, got {other:?}"),
    }
}

#[test]
fn click_walks_to_point_then_returns_to_idle() {
    let (mut scene, mut world) = single_stage();
    let target = Vec3::new(5.0, 0.0, 5.0);

    let click = pointer_at(&world, target, PointerEventKind::Click);
    scene.update(DT, &click, &mut world);

    let walk = request(&scene, 0).expect("navigation started");
    assert!((walk.target - target).length() < POSITION_TOLERANCE);
    assert_eq!(walk.locomotion, Locomotion::Walk);
    let expected = WALK_SECONDS_PER_UNIT * 50.0_f32.sqrt();
    assert!(
        (walk.duration_seconds - expected).abs() < POSITION_TOLERANCE,
        "duration {} expected {expected}",
        walk.duration_seconds
    );
    assert_eq!(actor(&scene, 0).active_clip(), Some("walking"));

    // 14 frames of 0.1s stay short of the ~1.414s walk.
    let frames_before_arrival = (walk.duration_seconds / DT).floor() as usize;
    run_frames(&mut scene, &mut world, frames_before_arrival - 1);
    assert_eq!(actor(&scene, 0).active_clip(), Some("walking"));
    assert!(request(&scene, 0).is_some());
    let almost = actor(&scene, 0).position;
    assert!(almost.distance(walk.target) > 1e-4);
    assert!(almost.distance(walk.target) < 0.1);

    run_frames(&mut scene, &mut world, 1);
    let beta = actor(&scene, 0);
    assert_eq!(beta.position, walk.target);
    assert_eq!(beta.active_clip(), Some("standing"));
    assert!(request(&scene, 0).is_none());
    let entity = world.find_entity(beta.entity).expect("figure entity");
    assert_eq!(entity.transform.position, walk.target);
}

#[test]
fn ground_click_before_actor_loads_is_ignored_then_auto_selects() {
    let (mut scene, mut world) = stage_from(SINGLE_STAGE);
    let target = Vec3::new(5.0, 0.0, 5.0);

    scene.update(DT, &pointer_at(&world, target, PointerEventKind::Click), &mut world);
    assert_eq!(
        scene.last_click,
        Some(ClickOutcome::Ignored(IgnoredClick::NoSelection))
    );
    assert_eq!(scene.state.as_ref().and_then(|state| state.selected), None);
    assert!(world.debug_markers().is_empty());

    deliver(&mut scene, &mut world, AssetEvent::ActorLoaded(beta()));
    assert_eq!(scene.state.as_ref().and_then(|state| state.selected), Some(ActorId(0)));
    assert_eq!(actor(&scene, 0).active_clip(), Some("standing"));

    scene.update(DT, &pointer_at(&world, target, PointerEventKind::Click), &mut world);
    assert!(matches!(
        scene.last_click,
        Some(ClickOutcome::Navigating {
            actor: ActorId(0),
            locomotion: Locomotion::Walk,
            ..
        })
    ));
    assert_eq!(actor(&scene, 0).active_clip(), Some("walking"));
}

#[test]
fn stale_completion_leaves_newer_walk_untouched() {
    let (mut scene, mut world) = single_stage();
    scene.update(
        DT,
        &pointer_at(&world, Vec3::new(5.0, 0.0, 5.0), PointerEventKind::Click),
        &mut world,
    );
    run_frames(&mut scene, &mut world, 3);
    let first = request(&scene, 0).expect("first request");
    scene.update(
        DT,
        &pointer_at(&world, Vec3::new(-4.0, 0.0, 6.0), PointerEventKind::Click),
        &mut world,
    );
    let second = request(&scene, 0).expect("second request");
    let before = actor(&scene, 0).position;

    let state = scene.state.as_mut().expect("stage loaded");
    let applied = complete_navigation(
        state,
        TweenCompletion {
            id: first.tween,
            key: ActorId(0),
            value: first.target,
        },
    );

    assert!(!applied);
    assert_eq!(request(&scene, 0), Some(second));
    assert_eq!(actor(&scene, 0).position, before);
    assert_eq!(actor(&scene, 0).active_clip(), Some("walking"));
}

#[test]
fn actor_turns_to_face_destination() {
    let (mut scene, mut world) = single_stage();
    let click = pointer_at(&world, Vec3::new(5.0, 0.0, 5.0), PointerEventKind::Click);
    scene.update(DT, &click, &mut world);

    let beta = actor(&scene, 0);
    assert!(rotation_angle(beta.orientation, beta.target_orientation) < 1e-3);
    let forward = beta.orientation * Vec3::Z;
    assert!((forward - Vec3::new(1.0, 0.0, 1.0).normalize()).length() < 1e-2);
    let entity = world.find_entity(beta.entity).expect("figure entity");
    assert_eq!(entity.transform.rotation, beta.orientation);
}

#[test]
fn second_click_supersedes_first_without_backtracking() {
    let (mut scene, mut world) = single_stage();
    let first = Vec3::new(5.0, 0.0, 5.0);
    let second = Vec3::new(-4.0, 0.0, 6.0);

    scene.update(DT, &pointer_at(&world, first, PointerEventKind::Click), &mut world);
    run_frames(&mut scene, &mut world, 4);
    let first_request = request(&scene, 0).expect("first request");

    scene.update(DT, &pointer_at(&world, second, PointerEventKind::Click), &mut world);
    let second_request = request(&scene, 0).expect("second request");
    assert_ne!(first_request.request_id, second_request.request_id);
    assert_ne!(first_request.tween, second_request.tween);
    assert_eq!(
        scene.state.as_ref().map(|state| state.tweens.active_count()),
        Some(1)
    );

    let mut previous = actor(&scene, 0).position.distance(second_request.target);
    for _ in 0..200 {
        scene.update(DT, &frame(), &mut world);
        let remaining = actor(&scene, 0).position.distance(second_request.target);
        assert!(remaining <= previous + 1e-4, "moved away from the newer target");
        previous = remaining;
        if request(&scene, 0).is_none() {
            break;
        }
    }

    let beta = actor(&scene, 0);
    assert_eq!(beta.position, second_request.target);
    assert!(beta.position.distance(first) > 1.0);
    assert_eq!(beta.active_clip(), Some("standing"));
}

#[test]
fn double_click_runs_at_double_speed() {
    let (mut scene, mut world) = single_stage();
    let target = Vec3::new(5.0, 0.0, 5.0);
    scene.update(
        DT,
        &pointer_at(&world, target, PointerEventKind::DoubleClick),
        &mut world,
    );

    let run = request(&scene, 0).expect("run request");
    assert_eq!(run.locomotion, Locomotion::Run);
    let expected = RUN_SECONDS_PER_UNIT * 50.0_f32.sqrt();
    assert!((run.duration_seconds - expected).abs() < POSITION_TOLERANCE);
    assert_eq!(actor(&scene, 0).active_clip(), Some("running"));

    run_frames(&mut scene, &mut world, 8);
    assert_eq!(actor(&scene, 0).position, run.target);
    assert_eq!(actor(&scene, 0).active_clip(), Some("standing"));
}

#[test]
fn click_into_the_sky_changes_nothing() {
    let (mut scene, mut world) = single_stage();
    let before = actor(&scene, 0).clone();

    let sky = frame().with_pointer_event(PointerEventKind::Click, Vec2::new(640.0, 2.0));
    scene.update(DT, &sky, &mut world);

    let after = actor(&scene, 0);
    assert!(request(&scene, 0).is_none());
    assert_eq!(after.position, before.position);
    assert_eq!(after.orientation, before.orientation);
    assert_eq!(after.active_clip(), before.active_clip());
    assert!(world.debug_markers().is_empty());
}

#[test]
fn click_outside_window_is_ignored() {
    let (mut scene, mut world) = single_stage();
    let outside = InputSnapshot::empty()
        .with_window_size((0, 0))
        .with_pointer_event(PointerEventKind::Click, Vec2::new(10.0, 10.0));
    scene.update(DT, &outside, &mut world);
    assert!(request(&scene, 0).is_none());
}

#[test]
fn destination_marker_follows_navigation() {
    let (mut scene, mut world) = single_stage();
    let target = Vec3::new(2.0, 0.0, 1.0);
    scene.update(DT, &pointer_at(&world, target, PointerEventKind::Click), &mut world);

    let markers = world.debug_markers();
    assert_eq!(markers.len(), 1);
    assert!((markers[0].position_world - target).length() < POSITION_TOLERANCE);

    run_frames(&mut scene, &mut world, 40);
    assert!(world.debug_markers().is_empty());
}

#[test]
fn explicit_stage_ignores_ground_click_until_actor_selected() {
    let (mut scene, mut world) = spider_stage();
    let ground = Vec3::new(0.0, 0.0, 4.0);

    scene.update(DT, &pointer_at(&world, ground, PointerEventKind::Click), &mut world);
    assert!(request(&scene, 0).is_none());
    assert!(request(&scene, 1).is_none());
    assert_eq!(actor(&scene, 0).position, Vec3::new(-4.0, 0.0, 0.0));
    assert_eq!(actor(&scene, 1).position, Vec3::new(4.0, 0.0, 0.0));
}

#[test]
fn selected_actor_is_the_only_one_to_move() {
    let (mut scene, mut world) = spider_stage();
    let right_center = Vec3::new(4.0, 0.9, 0.0);

    scene.update(
        DT,
        &pointer_at(&world, right_center, PointerEventKind::Click),
        &mut world,
    );
    assert_eq!(scene.state.as_ref().and_then(|state| state.selected), Some(ActorId(1)));
    assert_eq!(
        world.visual_state().selected_actor,
        Some(actor(&scene, 1).entity)
    );

    let target = Vec3::new(2.0, 0.0, 4.0);
    scene.update(DT, &pointer_at(&world, target, PointerEventKind::Click), &mut world);
    assert!(request(&scene, 0).is_none());
    let walk = request(&scene, 1).expect("selected spider walks");
    assert_eq!(actor(&scene, 1).active_clip(), Some("walk"));

    run_frames(&mut scene, &mut world, 30);
    assert_eq!(actor(&scene, 0).position, Vec3::new(-4.0, 0.0, 0.0));
    assert_eq!(actor(&scene, 1).position, walk.target);
    // Spiders stop animating on arrival instead of idling.
    assert_eq!(actor(&scene, 1).active_clip(), None);
}

#[test]
fn failed_actor_is_absent_from_stage() {
    let (scene, world) = spider_stage();
    let state = scene.state.as_ref().expect("stage loaded");

    assert!(matches!(
        state.roster.slot(ActorId(2)),
        Some(ActorSlot::Failed { .. })
    ));
    assert!(state.roster.get(ActorId(2)).is_none());
    assert_eq!(state.roster.ready_count(), 2);
    let figures = world
        .entities()
        .iter()
        .filter(|entity| matches!(entity.renderable.kind, RenderableKind::Figure { .. }))
        .count();
    assert_eq!(figures, 2);
}

#[test]
fn loader_hang_up_fails_actors_still_loading() {
    let (mut scene, mut world) = stage_from(SPIDER_STAGE);
    let (sender, receiver) = mpsc::channel();
    let spider = loaded_actor(0, "spider_left", &[("walk", 0.8)]);
    sender
        .send(AssetEvent::ActorLoaded(spider))
        .expect("send");
    drop(sender);
    scene.loader = Some(StageLoader::from_receiver(receiver));

    scene.update(DT, &frame(), &mut world);

    assert!(scene.loader.is_none());
    let state = scene.state.as_ref().expect("stage loaded");
    assert_eq!(state.roster.ready_count(), 1);
    for slot in [1, 2] {
        assert!(matches!(
            state.roster.slot(ActorId(slot)),
            Some(ActorSlot::Failed { reason, .. }) if reason == "asset loader stopped"
        ));
    }
}

#[test]
fn selecting_failed_actor_reports_error() {
    let (mut scene, mut world) = spider_stage();
    let result = scene.execute_debug_command(SceneDebugCommand::Select { actor_id: 2 }, &mut world);
    assert!(matches!(result, SceneDebugCommandResult::Error(ref reason) if reason.contains("failed")));

    let result = scene.execute_debug_command(SceneDebugCommand::Select { actor_id: 0 }, &mut world);
    assert_eq!(success(result), "selected actor 0");
    assert_eq!(
        world.visual_state().selected_actor,
        Some(actor(&scene, 0).entity)
    );
}

#[test]
fn anim_command_switches_selected_clip() {
    let (mut scene, mut world) = single_stage();

    let result = scene.execute_debug_command(
        SceneDebugCommand::PlayClip {
            clip: "cheering".to_string(),
        },
        &mut world,
    );
    assert!(success(result).contains("cheering"));
    assert_eq!(actor(&scene, 0).active_clip(), Some("cheering"));

    let result = scene.execute_debug_command(
        SceneDebugCommand::PlayClip {
            clip: "dance".to_string(),
        },
        &mut world,
    );
    assert!(
        matches!(result, SceneDebugCommandResult::Error(ref text) if text.contains("unknown clip 'dance'"))
    );
    assert_eq!(actor(&scene, 0).active_clip(), Some("cheering"));
}

#[test]
fn anim_command_without_selection_errors() {
    let (mut scene, mut world) = spider_stage();
    let result = scene.execute_debug_command(
        SceneDebugCommand::PlayClip {
            clip: "walk".to_string(),
        },
        &mut world,
    );
    assert_eq!(
        result,
        SceneDebugCommandResult::Error("no selected actor".to_string())
    );
}

#[test]
fn set_param_updates_environment() {
    let (mut scene, mut world) = single_stage();

    let result = scene.execute_debug_command(
        SceneDebugCommand::SetParam {
            name: "AmbientIntensity".to_string(),
            value: "0.5".to_string(),
        },
        &mut world,
    );
    assert_eq!(success(result), "AmbientIntensity = 0.50");
    assert!((world.environment().ambient_intensity - 0.5).abs() < 1e-4);

    let result = scene.execute_debug_command(
        SceneDebugCommand::GetParam {
            name: "AmbientIntensity".to_string(),
        },
        &mut world,
    );
    assert_eq!(success(result), "AmbientIntensity = 0.50");

    let result = scene.execute_debug_command(
        SceneDebugCommand::SetParam {
            name: "AmbientIntensity".to_string(),
            value: "bright".to_string(),
        },
        &mut world,
    );
    assert!(matches!(result, SceneDebugCommandResult::Error(_)));
}

#[test]
fn params_listing_covers_panel_folders() {
    let (mut scene, mut world) = single_stage();
    let listing = success(scene.execute_debug_command(SceneDebugCommand::ListParams, &mut world));

    for expected in [
        "cube rotation/CubeRotationX",
        "DirectionalLight/ShadowLeft",
        "AmbientLight/AmbientIntensity",
        "camera/CameraZ",
        "Material/ToonColor",
        "Material/ToonJointsColor",
        "SceneColor/SceneColor",
        "Background Gradient Customization/BGColor4",
    ] {
        assert!(listing.contains(expected), "missing {expected} in\n{listing}");
    }
    assert!(scene.params().is_some());
}

#[test]
fn dump_state_reports_actors_and_navigation() {
    let (mut scene, mut world) = spider_stage();
    scene.execute_debug_command(SceneDebugCommand::Select { actor_id: 0 }, &mut world);
    scene.update(
        DT,
        &pointer_at(&world, Vec3::new(-4.0, 0.0, 5.0), PointerEventKind::Click),
        &mut world,
    );

    let dump = success(scene.execute_debug_command(SceneDebugCommand::DumpState, &mut world));
    let parsed: serde_json::Value = serde_json::from_str(&dump).expect("valid json");
    assert_eq!(parsed["stage"], "spiders");
    assert_eq!(parsed["selected"], 0);
    assert_eq!(parsed["actors"][0]["state"], "ready");
    assert_eq!(parsed["actors"][0]["navigation"]["locomotion"], "walk");
    assert_eq!(parsed["actors"][1]["navigation"], serde_json::Value::Null);
    assert_eq!(parsed["actors"][2]["state"], "failed");
    assert_eq!(parsed["actors"][2]["reason"], "model not found");
}

#[test]
fn tab_requests_scene_switch() {
    let (mut scene, mut world) = single_stage();
    let command = scene.update(DT, &frame().with_switch_scene_pressed(true), &mut world);
    assert_eq!(command, SceneCommand::SwitchTo(SceneKey::B));
}

#[test]
fn orbit_keys_move_camera_around_target() {
    let (mut scene, mut world) = single_stage();
    let before = world.camera().eye();
    let orbit = frame().with_action_down(InputAction::OrbitRight, true);
    scene.update(DT, &orbit, &mut world);
    let after = world.camera().eye();

    assert!(before.distance(after) > 1e-3);
    let target = world.camera().target;
    assert!((before.distance(target) - after.distance(target)).abs() < 1e-3);
}

#[test]
fn unload_drops_stage_state() {
    let (mut scene, mut world) = single_stage();
    scene.unload(&mut world);
    assert!(scene.state.is_none());
    assert!(scene.debug_title(&world).is_none());
}

#[test]
fn missing_manifest_leaves_scene_empty_but_alive() {
    let mut scene = StageScene::new(
        "B",
        StageSource::File(PathBuf::from("/nonexistent/stages/none.json")),
        PathBuf::from("/nonexistent/assets"),
        SceneKey::A,
    );
    let mut world = SceneWorld::default();
    scene.load(&mut world);

    assert!(scene.state.is_none());
    assert!(scene.load_error.is_some());
    assert_eq!(scene.update(DT, &frame(), &mut world), SceneCommand::None);
    let lines = scene.debug_lines(&world).expect("lines");
    assert!(lines.iter().any(|line| line.starts_with("load error:")));
}

#[test]
fn manifest_on_disk_with_missing_model_settles_as_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stages = dir.path().join("stages");
    std::fs::create_dir_all(&stages).expect("stages dir");
    let manifest_path = stages.join("single.json");
    std::fs::write(&manifest_path, SINGLE_STAGE).expect("write manifest");

    let mut scene = StageScene::new(
        "A",
        StageSource::File(manifest_path),
        dir.path().to_path_buf(),
        SceneKey::B,
    );
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    assert!(scene.load_error.is_none());

    for _ in 0..500 {
        scene.update(DT, &frame(), &mut world);
        if scene.loader.is_none() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    let state = scene.state.as_ref().expect("stage loaded");
    assert!(state.roster.is_settled());
    assert!(matches!(
        state.roster.slot(ActorId(0)),
        Some(ActorSlot::Failed { .. })
    ));
    assert!(state.selected.is_none());
}

#[test]
fn shipped_stage_manifests_are_valid() {
    let stages = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/stages");
    for (file, selection) in [
        ("single.json", engine::SelectionMode::Auto),
        ("spiders.json", engine::SelectionMode::Explicit),
    ] {
        let manifest = engine::load_stage_manifest(&stages.join(file))
            .unwrap_or_else(|err| panic!("{file}: {err}"));
        assert_eq!(manifest.selection, selection, "{file}");
        assert!(!manifest.actors.is_empty(), "{file}");
    }
}
