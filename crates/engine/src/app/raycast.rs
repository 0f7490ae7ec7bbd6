use glam::Vec3;

pub const GROUND_HALF_EXTENT: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// `direction` is normalized; a zero direction stays zero and hits nothing.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Finite horizontal plane centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPlane {
    pub height: f32,
    pub half_extent: f32,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self {
            height: 0.0,
            half_extent: GROUND_HALF_EXTENT,
        }
    }
}

impl GroundPlane {
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)> {
        if ray.direction.y.abs() <= f32::EPSILON {
            return None;
        }
        let t = (self.height - ray.origin.y) / ray.direction.y;
        if !t.is_finite() || t < 0.0 {
            return None;
        }
        let point = ray.at(t);
        if point.x.abs() > self.half_extent || point.z.abs() > self.half_extent {
            return None;
        }
        Some((t, Vec3::new(point.x, self.height, point.z)))
    }
}

/// Axis-aligned box used to pick actors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorHitVolume {
    pub min: Vec3,
    pub max: Vec3,
}

impl ActorHitVolume {
    pub fn from_bounds(position: Vec3, local_min: Vec3, local_max: Vec3, scale: f32) -> Self {
        let a = position + local_min * scale;
        let b = position + local_max * scale;
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Slab test. Returns the entry distance, or zero when the origin is inside.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if direction.abs() <= f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }
        Some(t_min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayHit<K> {
    Actor(K),
    Ground(Vec3),
    Nothing,
}

/// Actors are tested first and the nearest one wins; the ground is only
/// consulted when no actor volume is hit.
pub fn cast_scene_ray<K, I>(ray: &Ray, actors: I, ground: &GroundPlane) -> RayHit<K>
where
    K: Copy,
    I: IntoIterator<Item = (K, ActorHitVolume)>,
{
    if ray.direction == Vec3::ZERO {
        return RayHit::Nothing;
    }

    let nearest = actors
        .into_iter()
        .filter_map(|(key, volume)| volume.intersect(ray).map(|t| (key, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((key, _)) = nearest {
        return RayHit::Actor(key);
    }

    match ground.intersect(ray) {
        Some((_, point)) => RayHit::Ground(point),
        None => RayHit::Nothing,
    }
}
