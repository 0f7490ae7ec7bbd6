use glam::Vec3;

use crate::assets::{GradientRamp, ToneMap};

pub const DEFAULT_SCENE_COLOR: u32 = 0x8E8B8B;
pub const DEFAULT_SHADOW_COLOR: u32 = 0x262931;
pub const DEFAULT_OUTLINE_COLOR: Vec3 = Vec3::new(0.09, 0.17, 0.15);
pub const DEFAULT_OUTLINE_ALPHA: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ToonMaterial {
    pub name: String,
    pub color: u32,
}

/// Sun light. The shadow box bounds are kept for the parameter panel and
/// limit where contact shadows are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: u32,
    pub intensity: f32,
    pub position: Vec3,
    pub shadow_left: f32,
    pub shadow_right: f32,
    pub shadow_top: f32,
    pub shadow_bottom: f32,
    pub shadow_near: f32,
    pub shadow_far: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: 0xE4E9ED,
            intensity: 1.0,
            position: Vec3::new(-4.0, 5.0, 3.0),
            shadow_left: -100.0,
            shadow_right: 100.0,
            shadow_top: 100.0,
            shadow_bottom: -100.0,
            shadow_near: 0.1,
            shadow_far: 100.0,
        }
    }
}

impl DirectionalLight {
    /// Unit vector from the scene toward the light.
    pub fn direction_to_light(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Y)
    }

    /// Whether a ground point lies inside the shadow box footprint.
    pub fn shadow_covers(&self, point: Vec3) -> bool {
        point.x >= self.shadow_left.min(self.shadow_right)
            && point.x <= self.shadow_left.max(self.shadow_right)
            && point.z >= self.shadow_bottom.min(self.shadow_top)
            && point.z <= self.shadow_bottom.max(self.shadow_top)
    }

    /// Ground point under a caster along the light direction. `None` when the
    /// caster is outside the shadow camera's depth range or the footprint
    /// falls outside the shadow box.
    pub fn shadow_footprint(&self, caster: Vec3) -> Option<Vec3> {
        let to_light = self.direction_to_light();
        if to_light.y <= f32::EPSILON || caster.y < 0.0 {
            return None;
        }
        let depth = (self.position - caster).dot(to_light);
        if depth < self.shadow_near || depth > self.shadow_far {
            return None;
        }
        let ground = caster - to_light * (caster.y / to_light.y);
        self.shadow_covers(ground).then_some(ground)
    }
}

/// Everything the renderer needs besides entities: sky, lights and the
/// material table shared by props and actor parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub background: GradientRamp,
    pub scene_color: u32,
    pub ambient_color: u32,
    pub ambient_intensity: f32,
    pub sun: DirectionalLight,
    pub materials: Vec<ToonMaterial>,
    pub outline_color: Vec3,
    pub outline_alpha: f32,
    pub shadow_color: u32,
    pub tone_map: ToneMap,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            background: GradientRamp::default(),
            scene_color: DEFAULT_SCENE_COLOR,
            ambient_color: 0xFFFFFF,
            ambient_intensity: 0.16,
            sun: DirectionalLight::default(),
            materials: Vec::new(),
            outline_color: DEFAULT_OUTLINE_COLOR,
            outline_alpha: DEFAULT_OUTLINE_ALPHA,
            shadow_color: DEFAULT_SHADOW_COLOR,
            tone_map: ToneMap::default(),
        }
    }
}

impl Environment {
    pub fn add_material(&mut self, name: impl Into<String>, color: u32) -> MaterialId {
        let name = name.into();
        if let Some(existing) = self.material_id(&name) {
            self.materials[existing.0].color = color;
            return existing;
        }
        self.materials.push(ToonMaterial { name, color });
        MaterialId(self.materials.len() - 1)
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .position(|material| material.name == name)
            .map(MaterialId)
    }

    pub fn material(&self, id: MaterialId) -> Option<&ToonMaterial> {
        self.materials.get(id.0)
    }

    pub fn set_material_color(&mut self, id: MaterialId, color: u32) -> bool {
        match self.materials.get_mut(id.0) {
            Some(material) => {
                material.color = color & 0x00FF_FFFF;
                true
            }
            None => false,
        }
    }

    /// Replaces one background stop color; the sky texture is rebaked.
    pub fn set_background_color(&mut self, index: usize, color: u32) -> bool {
        self.background.set_color(index, color)
    }

    /// Toon shade factor for a surface normal: wrapped diffuse quantized
    /// through the tone map, lifted by the ambient term.
    pub fn shade(&self, normal: Vec3) -> f32 {
        let diffuse = normal.dot(self.sun.direction_to_light()) * 0.5 + 0.5;
        let banded = self.tone_map.quantize(diffuse) * self.sun.intensity;
        (banded + self.ambient_intensity).clamp(0.0, 1.0)
    }
}
