use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::ManifestError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// The first actor to finish loading is selected automatically.
    #[default]
    Auto,
    /// An actor must be clicked before ground clicks move it.
    Explicit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalBehavior {
    #[default]
    Idle,
    Stop,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageManifest {
    pub name: String,
    #[serde(default)]
    pub physics: bool,
    #[serde(default)]
    pub selection: SelectionMode,
    #[serde(default)]
    pub arrival: ArrivalBehavior,
    #[serde(default)]
    pub tone_map: Option<String>,
    #[serde(default)]
    pub materials: Vec<MaterialManifest>,
    #[serde(default)]
    pub actors: Vec<ActorManifest>,
    #[serde(default)]
    pub props: Vec<PropManifest>,
    #[serde(default)]
    pub lighting: LightingManifest,
    #[serde(default)]
    pub background: BackgroundManifest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialManifest {
    pub name: String,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub color: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorManifest {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub clips: Vec<ClipManifest>,
    #[serde(default)]
    pub materials: Vec<MaterialBinding>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub locomotion: LocomotionClips,
    /// Clip started once every clip has loaded.
    #[serde(default)]
    pub start_clip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipManifest {
    pub name: String,
    #[serde(flatten)]
    pub source: ClipSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ClipSource {
    Embedded { embedded: usize },
    File { file: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialBinding {
    pub mesh: String,
    pub material: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocomotionClips {
    #[serde(default)]
    pub idle: Option<String>,
    pub walk: String,
    pub run: String,
}

impl Default for LocomotionClips {
    fn default() -> Self {
        Self {
            idle: Some("standing".to_string()),
            walk: "walking".to_string(),
            run: "running".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropManifest {
    pub name: String,
    pub shape: PropShapeManifest,
    #[serde(default)]
    pub position: [f32; 3],
    pub material: String,
    /// Props with a mass get a dynamic body when the stage enables physics.
    #[serde(default)]
    pub mass: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PropShapeManifest {
    Box { size: f32 },
    Sphere { radius: f32 },
    Icosahedron { radius: f32 },
    TorusKnot { radius: f32, tube: f32 },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightingManifest {
    #[serde(default)]
    pub ambient_intensity: Option<f32>,
    #[serde(default)]
    pub directional_intensity: Option<f32>,
    #[serde(default)]
    pub directional_position: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundManifest {
    #[serde(default, deserialize_with = "deserialize_optional_hex_colors")]
    pub gradient: Option<Vec<u32>>,
    #[serde(default, deserialize_with = "deserialize_optional_hex_color")]
    pub scene_color: Option<u32>,
}

fn default_scale() -> f32 {
    1.0
}

/// Accepts `#rrggbb`, `0xrrggbb` or bare `rrggbb`.
pub fn parse_hex_color(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 6 {
        return Err(format!("expected six hex digits, got '{raw}'"));
    }
    u32::from_str_radix(digits, 16).map_err(|_| format!("invalid hex color '{raw}'"))
}

pub fn format_hex_color(color: u32) -> String {
    format!("#{:06x}", color & 0x00FF_FFFF)
}

fn deserialize_hex_color<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_hex_color(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_optional_hex_color<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| parse_hex_color(&value).map_err(serde::de::Error::custom))
        .transpose()
}

fn deserialize_optional_hex_colors<'de, D>(deserializer: D) -> Result<Option<Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    raw.map(|values| {
        values
            .iter()
            .map(|value| parse_hex_color(value).map_err(serde::de::Error::custom))
            .collect()
    })
    .transpose()
}

pub fn load_stage_manifest(path: &Path) -> Result<StageManifest, ManifestError> {
    let raw = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stage_manifest(&raw, path)
}

pub fn parse_stage_manifest(raw: &str, path: &Path) -> Result<StageManifest, ManifestError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let manifest: StageManifest = serde_path_to_error::deserialize(&mut deserializer).map_err(
        |error| {
            let json_path = error.path().to_string();
            ManifestError::Parse {
                path: path.to_path_buf(),
                json_path,
                source: error.into_inner(),
            }
        },
    )?;
    validate_stage_manifest(&manifest).map_err(|message| ManifestError::Invalid {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(manifest)
}

fn validate_stage_manifest(manifest: &StageManifest) -> Result<(), String> {
    let material_names: HashSet<&str> = manifest
        .materials
        .iter()
        .map(|material| material.name.as_str())
        .collect();
    if material_names.len() != manifest.materials.len() {
        return Err("duplicate material name".to_string());
    }

    let mut actor_names = HashSet::new();
    for (index, actor) in manifest.actors.iter().enumerate() {
        let at = format!("actors[{index}]");
        if actor.name.trim().is_empty() {
            return Err(format!("{at}.name cannot be empty"));
        }
        if !actor_names.insert(actor.name.as_str()) {
            return Err(format!("{at}.name '{}' is duplicated", actor.name));
        }
        if !actor.scale.is_finite() || actor.scale <= 0.0 {
            return Err(format!("{at}.scale must be positive, got {}", actor.scale));
        }
        let mut clip_names = HashSet::new();
        for clip in &actor.clips {
            if !clip_names.insert(clip.name.as_str()) {
                return Err(format!("{at}.clips has duplicate clip '{}'", clip.name));
            }
        }
        if !actor.clips.is_empty() {
            let locomotion = &actor.locomotion;
            let required = [Some(&locomotion.walk), Some(&locomotion.run), locomotion.idle.as_ref()];
            for name in required.into_iter().flatten() {
                if !clip_names.contains(name.as_str()) {
                    return Err(format!("{at}.locomotion refers to unknown clip '{name}'"));
                }
            }
            if let Some(start) = &actor.start_clip {
                if !clip_names.contains(start.as_str()) {
                    return Err(format!("{at}.start_clip refers to unknown clip '{start}'"));
                }
            }
        }
        for binding in &actor.materials {
            if !material_names.contains(binding.material.as_str()) {
                return Err(format!(
                    "{at}.materials binds mesh '{}' to unknown material '{}'",
                    binding.mesh, binding.material
                ));
            }
        }
    }

    for (index, prop) in manifest.props.iter().enumerate() {
        if !material_names.contains(prop.material.as_str()) {
            return Err(format!(
                "props[{index}].material refers to unknown material '{}'",
                prop.material
            ));
        }
        if let Some(mass) = prop.mass {
            if !mass.is_finite() || mass <= 0.0 {
                return Err(format!("props[{index}].mass must be positive, got {mass}"));
            }
        }
    }

    if let Some(gradient) = &manifest.background.gradient {
        if gradient.len() != super::BACKGROUND_GRADIENT_OFFSETS.len() {
            return Err(format!(
                "background.gradient needs {} colors, got {}",
                super::BACKGROUND_GRADIENT_OFFSETS.len(),
                gradient.len()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = r##"{
        "name": "single",
        "physics": true,
        "tone_map": "img/gradientMaps/fiveTone.jpg",
        "materials": [
            { "name": "toon", "color": "#18bfe3" },
            { "name": "toon_joints", "color": "0x1C5B72" }
        ],
        "actors": [{
            "name": "beta",
            "model": "models/beta.glb",
            "scale": 5.0,
            "clips": [
                { "name": "default", "embedded": 0 },
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
              "position": [-3.0, 3.0, 0.0], "material": "toon" },
            { "name": "knot", "shape": { "kind": "torus_knot", "radius": 1.0, "tube": 0.4 },
              "position": [-6.0, 6.0, 0.0], "material": "toon", "mass": 1.0 }
        ]
    }"##;

    fn parse(raw: &str) -> Result<StageManifest, ManifestError> {
        parse_stage_manifest(raw, Path::new("stage.json"))
    }

    #[test]
    fn parses_full_stage() {
        let manifest = parse(SINGLE).expect("manifest");
        assert!(manifest.physics);
        assert_eq!(manifest.selection, SelectionMode::Auto);
        assert_eq!(manifest.arrival, ArrivalBehavior::Idle);
        assert_eq!(manifest.materials[0].color, 0x18BFE3);
        assert_eq!(manifest.materials[1].color, 0x1C5B72);

        let actor = &manifest.actors[0];
        assert_eq!(actor.clips.len(), 4);
        assert_eq!(actor.clips[0].source, ClipSource::Embedded { embedded: 0 });
        assert_eq!(
            actor.clips[1].source,
            ClipSource::File {
                file: "models/standing.glb".to_string()
            }
        );
        assert_eq!(actor.locomotion, LocomotionClips::default());
        assert_eq!(manifest.props[1].mass, Some(1.0));
        assert_eq!(
            manifest.props[1].shape,
            PropShapeManifest::TorusKnot {
                radius: 1.0,
                tube: 0.4
            }
        );
    }

    #[test]
    fn parse_error_reports_json_path() {
        let raw = r#"{ "name": "x", "actors": [{ "name": "a", "model": "m.glb", "scale": "big" }] }"#;
        match parse(raw) {
            Err(ManifestError::Parse { json_path, .. }) => {
                assert_eq!(json_path, "actors[0].scale");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_locomotion_clip_is_rejected() {
        let raw = r#"{
            "name": "x",
            "actors": [{
                "name": "a",
                "model": "m.glb",
                "clips": [{ "name": "walking", "embedded": 0 }],
                "locomotion": { "walk": "walking", "run": "sprinting" }
            }]
        }"#;
        match parse(raw) {
            Err(ManifestError::Invalid { message, .. }) => {
                assert!(message.contains("sprinting"), "{message}");
            }
            other => panic!("expected invalid manifest, got {other:?}"),
        }
    }

    #[test]
    fn unknown_material_binding_is_rejected() {
        let raw = r#"{
            "name": "x",
            "actors": [{
                "name": "a",
                "model": "m.glb",
                "materials": [{ "mesh": "Body", "material": "chrome" }]
            }]
        }"#;
        assert!(matches!(parse(raw), Err(ManifestError::Invalid { .. })));
    }

    #[test]
    fn background_gradient_needs_four_colors() {
        let raw = r##"{ "name": "x", "background": { "gradient": ["#000000"] } }"##;
        assert!(matches!(parse(raw), Err(ManifestError::Invalid { .. })));
    }

    #[test]
    fn hex_color_forms() {
        assert_eq!(parse_hex_color("#8e8b8b"), Ok(0x8E8B8B));
        assert_eq!(parse_hex_color("0x262931"), Ok(0x262931));
        assert_eq!(parse_hex_color("ffffff"), Ok(0xFFFFFF));
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#gggggg").is_err());
        assert_eq!(format_hex_color(0x0B1018), "#0b1018");
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_stage_manifest(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(ManifestError::Read { .. })));
    }
}
