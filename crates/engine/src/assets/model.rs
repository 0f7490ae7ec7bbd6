use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use gltf::buffer::Data;

use super::AssetError;
use crate::app::AnimationClip;

/// What the runtime keeps from a decoded glTF model: named mesh parts,
/// model-space bounds and the clip table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub path: PathBuf,
    pub mesh_names: Vec<String>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub clips: Vec<AnimationClip>,
}

impl ModelAsset {
    pub fn height(&self) -> f32 {
        (self.bounds_max.y - self.bounds_min.y).max(0.0)
    }

    /// Largest horizontal half extent.
    pub fn radius(&self) -> f32 {
        let extent = (self.bounds_max - self.bounds_min) * 0.5;
        extent.x.max(extent.z).max(0.0)
    }
}

pub fn load_model(path: &Path) -> Result<ModelAsset, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;

    let mut mesh_names = Vec::new();
    let mut bounds: Option<(Vec3, Vec3)> = None;
    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next())
    {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().collect(),
    };
    for node in roots {
        visit_node(&node, Mat4::IDENTITY, &mut mesh_names, &mut bounds);
    }

    let Some((bounds_min, bounds_max)) = bounds else {
        return Err(AssetError::NoMeshes {
            path: path.to_path_buf(),
        });
    };

    Ok(ModelAsset {
        path: path.to_path_buf(),
        mesh_names,
        bounds_min,
        bounds_max,
        clips: clips_from_document(&document, &buffers),
    })
}

/// Clips stored in a standalone animation file.
pub fn clips_from_file(path: &Path) -> Result<Vec<AnimationClip>, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;
    let clips = clips_from_document(&document, &buffers);
    if clips.is_empty() {
        return Err(AssetError::NoAnimations {
            path: path.to_path_buf(),
        });
    }
    Ok(clips)
}

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    mesh_names: &mut Vec<String>,
    bounds: &mut Option<(Vec3, Vec3)>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| mesh.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        mesh_names.push(name);

        for primitive in mesh.primitives() {
            let local = primitive.bounding_box();
            let (min, max) = (Vec3::from(local.min), Vec3::from(local.max));
            for corner in box_corners(min, max) {
                let point = world.transform_point3(corner);
                *bounds = Some(match *bounds {
                    Some((lo, hi)) => (lo.min(point), hi.max(point)),
                    None => (point, point),
                });
            }
        }
    }
    for child in node.children() {
        visit_node(&child, world, mesh_names, bounds);
    }
}

fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}

fn clips_from_document(document: &gltf::Document, buffers: &[Data]) -> Vec<AnimationClip> {
    document
        .animations()
        .map(|animation| {
            let duration = animation
                .channels()
                .filter_map(|channel| {
                    let reader = channel
                        .reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
                    reader
                        .read_inputs()
                        .map(|inputs| inputs.fold(0.0_f32, f32::max))
                })
                .fold(0.0_f32, f32::max);
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("clip_{}", animation.index()));
            AnimationClip::new(name, duration)
        })
        .collect()
}
