use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};

use crate::app::tools::text::blend_pixel;
use crate::app::{
    DebugMarker, DebugMarkerKind, Entity, Environment, FigurePart, MaterialId, OrbitCamera,
    PropShape, RenderableKind, SceneWorld, Transform,
};
use crate::assets::unpack_rgb;

const GRID_HALF_LINES: i32 = 10;
const GRID_SPACING: f32 = 2.0;
const GRID_SEGMENTS: i32 = 8;
const GRID_ALPHA: u8 = 40;
const SHADOW_ALPHA: u8 = 150;
const SHADOW_CASTER_SHRINK: f32 = 0.8;
const MIN_SHADOW_SQUASH: f32 = 0.2;
const OUTLINE_WIDTH_PX: f32 = 2.0;
const MAX_LINE_STEPS: f32 = 8192.0;
const FALLBACK_MATERIAL_COLOR: u32 = 0xB8B8B8;
const JOINT_BANDS: [f32; 3] = [0.3, 0.55, 0.8];
const JOINT_BAND_HALF_WIDTH: f32 = 0.035;
const STRIDE_BOB_FRACTION: f32 = 0.04;
const HEAD_MARKER_HEIGHT_FRACTION: f32 = 0.8;
const HEAD_MARKER_RADIUS_FRACTION: f32 = 0.25;
const SELECTION_RING_COLOR: [u8; 4] = [255, 236, 120, 255];
const SELECTION_RING_RADIUS_FACTOR: f32 = 1.5;
const RING_SEGMENTS: usize = 32;
const DESTINATION_MARKER_COLOR: [u8; 4] = [255, 120, 120, 255];
const DESTINATION_MARKER_HALF_SIZE: f32 = 0.4;

struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl Canvas<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn blend(&mut self, x: i32, y: i32, color: [u8; 4]) {
        blend_pixel(self.frame, self.width, self.height, x, y, color);
    }

    fn fill_row(&mut self, y: u32, rgb: [u8; 3]) {
        let row_bytes = self.width as usize * 4;
        let start = y as usize * row_bytes;
        let Some(row) = self.frame.get_mut(start..start + row_bytes) else {
            return;
        };
        for pixel in row.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: [u8; 4]) {
        if !from.is_finite() || !to.is_finite() {
            return;
        }
        let (width, height) = (self.width as f32, self.height as f32);
        if (from.x < 0.0 && to.x < 0.0)
            || (from.y < 0.0 && to.y < 0.0)
            || (from.x >= width && to.x >= width)
            || (from.y >= height && to.y >= height)
        {
            return;
        }
        let delta = to - from;
        let steps = delta.x.abs().max(delta.y.abs()).ceil().clamp(1.0, MAX_LINE_STEPS) as i32;
        for step in 0..=steps {
            let point = from + delta * (step as f32 / steps as f32);
            self.blend(point.x.floor() as i32, point.y.floor() as i32, color);
        }
    }

    /// Pixel bounds of a box around `center`, clipped to the canvas.
    fn clipped_bounds(&self, center: Vec2, half_x: f32, half_y: f32) -> Option<(i32, i32, i32, i32)> {
        if !center.is_finite() || !half_x.is_finite() || !half_y.is_finite() {
            return None;
        }
        let x0 = (center.x - half_x).floor().max(0.0) as i32;
        let y0 = (center.y - half_y).floor().max(0.0) as i32;
        let x1 = (center.x + half_x).ceil().min(self.width as f32 - 1.0) as i32;
        let y1 = (center.y + half_y).ceil().min(self.height as f32 - 1.0) as i32;
        (x0 <= x1 && y0 <= y1).then_some((x0, y0, x1, y1))
    }
}

/// Draws the 3D part of a frame: sky, ground grid, shadows, depth-sorted
/// props and figures, selection ring and debug markers.
pub(crate) fn draw_scene(frame: &mut [u8], width: u32, height: u32, world: &SceneWorld) {
    if width == 0 || height == 0 || frame.len() < width as usize * height as usize * 4 {
        return;
    }
    let mut canvas = Canvas {
        frame,
        width,
        height,
    };
    let camera = world.camera();
    let environment = world.environment();

    draw_sky(&mut canvas, camera, environment);
    draw_ground_grid(&mut canvas, camera, environment);
    draw_shadows(&mut canvas, camera, environment, world.entities());

    let selected = world.visual_state().selected_actor;
    for entity in depth_sorted(camera, world.entities(), canvas.size()) {
        if selected == Some(entity.id) {
            draw_selection_ring(&mut canvas, camera, entity);
        }
        draw_entity(&mut canvas, camera, environment, entity);
    }
    for marker in world.debug_markers() {
        draw_debug_marker(&mut canvas, camera, marker);
    }
}

/// Sky sphere lookup: each row samples the gradient at the elevation of the
/// camera ray through the row's center, `0.5` being the horizon.
fn draw_sky(canvas: &mut Canvas<'_>, camera: &OrbitCamera, environment: &Environment) {
    let height = canvas.height;
    for y in 0..height {
        let ndc_y = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
        let direction = camera.ray_from_ndc(Vec2::new(0.0, ndc_y)).direction;
        let elevation = direction.normalize_or_zero().y.clamp(-1.0, 1.0).asin();
        let rgb = environment.background.baked_at(0.5 + elevation / PI);
        canvas.fill_row(y, rgb);
    }
}

fn draw_ground_grid(canvas: &mut Canvas<'_>, camera: &OrbitCamera, environment: &Environment) {
    let [r, g, b] = unpack_rgb(environment.scene_color);
    let color = [r, g, b, GRID_ALPHA];
    let extent = GRID_HALF_LINES as f32 * GRID_SPACING;
    for index in -GRID_HALF_LINES..=GRID_HALF_LINES {
        let offset = index as f32 * GRID_SPACING;
        draw_world_polyline(
            canvas,
            camera,
            &subdivide(Vec3::new(offset, 0.0, -extent), Vec3::new(offset, 0.0, extent)),
            color,
        );
        draw_world_polyline(
            canvas,
            camera,
            &subdivide(Vec3::new(-extent, 0.0, offset), Vec3::new(extent, 0.0, offset)),
            color,
        );
    }
}

fn subdivide(from: Vec3, to: Vec3) -> Vec<Vec3> {
    (0..=GRID_SEGMENTS)
        .map(|step| from.lerp(to, step as f32 / GRID_SEGMENTS as f32))
        .collect()
}

/// Segments with an endpoint behind the camera are skipped.
fn draw_world_polyline(canvas: &mut Canvas<'_>, camera: &OrbitCamera, points: &[Vec3], color: [u8; 4]) {
    let size = canvas.size();
    let projected: Vec<Option<Vec2>> = points
        .iter()
        .map(|point| camera.project_to_screen(*point, size).map(|(screen, _)| screen))
        .collect();
    for pair in projected.windows(2) {
        if let (Some(from), Some(to)) = (pair[0], pair[1]) {
            canvas.line(from, to, color);
        }
    }
}

fn draw_shadows(
    canvas: &mut Canvas<'_>,
    camera: &OrbitCamera,
    environment: &Environment,
    entities: &[Entity],
) {
    let [r, g, b] = unpack_rgb(environment.shadow_color);
    let color = [r, g, b, SHADOW_ALPHA];
    let squash = camera.pitch().sin().abs().max(MIN_SHADOW_SQUASH);
    for entity in entities.iter().filter(|entity| entity.renderable.casts_shadow) {
        let (center, radius) = shadow_caster_extent(entity);
        let Some(ground) = environment.sun.shadow_footprint(center) else {
            continue;
        };
        let Some((screen, depth)) = camera.project_to_screen(ground, canvas.size()) else {
            continue;
        };
        let radius_px = radius * camera.pixels_per_unit_at_depth(depth, canvas.height);
        fill_ellipse(canvas, screen, radius_px, radius_px * squash, color);
    }
}

fn shadow_caster_extent(entity: &Entity) -> (Vec3, f32) {
    let transform = &entity.transform;
    match &entity.renderable.kind {
        RenderableKind::Prop { shape, .. } => (
            transform.position,
            shape.bounding_radius() * transform.scale.max_element() * SHADOW_CASTER_SHRINK,
        ),
        RenderableKind::Figure { height, radius, .. } => {
            (transform.position + Vec3::Y * (height * 0.5), *radius)
        }
    }
}

fn fill_ellipse(canvas: &mut Canvas<'_>, center: Vec2, radius_x: f32, radius_y: f32, color: [u8; 4]) {
    if radius_x < 0.5 || radius_y < 0.5 {
        return;
    }
    let Some((x0, y0, x1, y1)) = canvas.clipped_bounds(center, radius_x, radius_y) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = (x as f32 + 0.5 - center.x) / radius_x;
            let dy = (y as f32 + 0.5 - center.y) / radius_y;
            if dx * dx + dy * dy <= 1.0 {
                canvas.blend(x, y, color);
            }
        }
    }
}

/// Back to front by view depth; spawn order breaks ties.
fn depth_sorted<'a>(camera: &OrbitCamera, entities: &'a [Entity], size: (u32, u32)) -> Vec<&'a Entity> {
    let mut visible: Vec<(&Entity, f32)> = entities
        .iter()
        .filter_map(|entity| {
            camera
                .project_to_screen(entity.transform.position, size)
                .map(|(_, depth)| (entity, depth))
        })
        .collect();
    visible.sort_by(|(a, a_depth), (b, b_depth)| {
        b_depth
            .total_cmp(a_depth)
            .then(a.applied_spawn_order().cmp(&b.applied_spawn_order()))
    });
    visible.into_iter().map(|(entity, _)| entity).collect()
}

fn draw_entity(canvas: &mut Canvas<'_>, camera: &OrbitCamera, environment: &Environment, entity: &Entity) {
    let transform = &entity.transform;
    match &entity.renderable.kind {
        RenderableKind::Prop { shape, material } => {
            let rgb = material_rgb(environment, Some(*material));
            let scale = transform.scale.max_element();
            match *shape {
                PropShape::Box { half_extents } => {
                    draw_box(canvas, camera, environment, transform, half_extents, rgb)
                }
                PropShape::Sphere { radius } | PropShape::Icosahedron { radius } => draw_ball(
                    canvas,
                    camera,
                    environment,
                    transform.position,
                    radius * scale,
                    0.0,
                    rgb,
                ),
                PropShape::TorusKnot { radius, tube } => {
                    let outer = radius + tube;
                    let hole = if outer > f32::EPSILON {
                        ((radius - tube) / outer).max(0.0)
                    } else {
                        0.0
                    };
                    draw_ball(
                        canvas,
                        camera,
                        environment,
                        transform.position,
                        outer * scale,
                        hole,
                        rgb,
                    )
                }
            }
        }
        RenderableKind::Figure {
            height,
            radius,
            parts,
            stride_phase,
        } => draw_figure(
            canvas,
            camera,
            environment,
            transform,
            FigureShape {
                height: *height,
                radius: *radius,
                stride_phase: *stride_phase,
            },
            parts,
        ),
    }
}

fn material_rgb(environment: &Environment, material: Option<MaterialId>) -> [u8; 3] {
    let color = material
        .and_then(|id| environment.material(id))
        .map_or(FALLBACK_MATERIAL_COLOR, |material| material.color);
    unpack_rgb(color)
}

fn outline_rgba(environment: &Environment) -> [u8; 4] {
    let to_byte = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    let color = environment.outline_color;
    [
        to_byte(color.x),
        to_byte(color.y),
        to_byte(color.z),
        to_byte(environment.outline_alpha),
    ]
}

fn shaded(environment: &Environment, rgb: [u8; 3], world_normal: Vec3) -> [u8; 4] {
    let factor = environment.shade(world_normal.normalize_or_zero());
    let scale = |channel: u8| (channel as f32 * factor).round().clamp(0.0, 255.0) as u8;
    [scale(rgb[0]), scale(rgb[1]), scale(rgb[2]), 255]
}

fn view_to_world(camera: &OrbitCamera) -> Mat4 {
    camera.view_matrix().inverse()
}

/// Sphere impostor; a non-zero `hole` (fraction of the radius) cuts a ring.
fn draw_ball(
    canvas: &mut Canvas<'_>,
    camera: &OrbitCamera,
    environment: &Environment,
    center_world: Vec3,
    radius_world: f32,
    hole: f32,
    rgb: [u8; 3],
) {
    let Some((center, depth)) = camera.project_to_screen(center_world, canvas.size()) else {
        return;
    };
    let radius_px = radius_world * camera.pixels_per_unit_at_depth(depth, canvas.height);
    if radius_px < 0.5 {
        return;
    }
    let Some((x0, y0, x1, y1)) = canvas.clipped_bounds(center, radius_px, radius_px) else {
        return;
    };
    let to_world = view_to_world(camera);
    let outline = outline_rgba(environment);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let offset = (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center) / radius_px;
            let distance = offset.length();
            if distance > 1.0 || distance < hole {
                continue;
            }
            let edge_px = ((1.0 - distance).min(distance - hole)) * radius_px;
            if edge_px <= OUTLINE_WIDTH_PX {
                canvas.blend(x, y, outline);
                continue;
            }
            let normal_view = Vec3::new(offset.x, -offset.y, (1.0 - distance * distance).sqrt());
            let color = shaded(environment, rgb, to_world.transform_vector3(normal_view));
            canvas.blend(x, y, color);
        }
    }
}

const BOX_FACE_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

fn draw_box(
    canvas: &mut Canvas<'_>,
    camera: &OrbitCamera,
    environment: &Environment,
    transform: &Transform,
    half_extents: Vec3,
    rgb: [u8; 3],
) {
    let scaled = half_extents * transform.scale;
    let eye = camera.eye();
    let outline = outline_rgba(environment);
    let to_world = |local: Vec3| transform.position + transform.rotation * (scaled * local);

    for axis in 0..3 {
        for sign in [-1.0f32, 1.0] {
            let mut normal_local = Vec3::ZERO;
            normal_local[axis] = sign;
            let normal = transform.rotation * normal_local;
            if normal.dot(eye - to_world(normal_local)) <= 0.0 {
                continue;
            }
            let projected: Option<Vec<Vec2>> = BOX_FACE_CORNERS
                .iter()
                .map(|&(u, v)| {
                    let mut local = normal_local;
                    local[(axis + 1) % 3] = u;
                    local[(axis + 2) % 3] = v;
                    camera
                        .project_to_screen(to_world(local), canvas.size())
                        .map(|(screen, _)| screen)
                })
                .collect();
            let Some(corners) = projected else {
                continue;
            };
            fill_convex_polygon(canvas, &corners, shaded(environment, rgb, normal));
            for index in 0..corners.len() {
                canvas.line(corners[index], corners[(index + 1) % corners.len()], outline);
            }
        }
    }
}

/// Scanline fill sampling pixel centers.
fn fill_convex_polygon(canvas: &mut Canvas<'_>, points: &[Vec2], color: [u8; 4]) {
    if points.len() < 3 || points.iter().any(|point| !point.is_finite()) {
        return;
    }
    let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let y0 = min_y.floor().max(0.0) as i32;
    let y1 = max_y.ceil().min(canvas.height as f32 - 1.0) as i32;
    for y in y0..=y1 {
        let sample_y = y as f32 + 0.5;
        let mut left = f32::INFINITY;
        let mut right = f32::NEG_INFINITY;
        for (index, a) in points.iter().enumerate() {
            let b = points[(index + 1) % points.len()];
            let crosses = (a.y <= sample_y && b.y > sample_y) || (b.y <= sample_y && a.y > sample_y);
            if crosses {
                let x = a.x + (sample_y - a.y) / (b.y - a.y) * (b.x - a.x);
                left = left.min(x);
                right = right.max(x);
            }
        }
        if left > right {
            continue;
        }
        let x0 = (left - 0.5).ceil().max(0.0) as i32;
        let x1 = (right - 0.5).floor().min(canvas.width as f32 - 1.0) as i32;
        for x in x0..=x1 {
            canvas.blend(x, y, color);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FigureShape {
    height: f32,
    radius: f32,
    stride_phase: Option<f32>,
}

/// Upright capsule impostor. The first part's material colors the body, the
/// second part's material colors the joint bands and the facing marker.
fn draw_figure(
    canvas: &mut Canvas<'_>,
    camera: &OrbitCamera,
    environment: &Environment,
    transform: &Transform,
    shape: FigureShape,
    parts: &[FigurePart],
) {
    let size = canvas.size();
    let height = shape.height.max(0.0);
    let radius = shape.radius.max(0.05).min(height * 0.5).max(0.05);
    let bob = shape
        .stride_phase
        .map_or(0.0, |phase| (phase * TAU).sin().abs() * STRIDE_BOB_FRACTION * height);
    let base = transform.position + Vec3::Y * bob;
    let bottom_world = base + Vec3::Y * radius;
    let top_world = base + Vec3::Y * (height - radius).max(radius);
    let (Some((bottom, bottom_depth)), Some((top, top_depth))) = (
        camera.project_to_screen(bottom_world, size),
        camera.project_to_screen(top_world, size),
    ) else {
        return;
    };
    let radius_px =
        radius * camera.pixels_per_unit_at_depth((bottom_depth + top_depth) * 0.5, canvas.height);
    if radius_px < 0.5 {
        return;
    }

    let body_rgb = material_rgb(environment, parts.first().and_then(|part| part.material));
    let joint_rgb = parts
        .get(1)
        .and_then(|part| part.material)
        .map_or(body_rgb, |id| material_rgb(environment, Some(id)));
    let outline = outline_rgba(environment);
    let to_world = view_to_world(camera);

    let center = (bottom + top) * 0.5;
    let half = (top - bottom).abs() * 0.5 + Vec2::splat(radius_px);
    let Some((x0, y0, x1, y1)) = canvas.clipped_bounds(center, half.x, half.y) else {
        return;
    };
    let axis = top - bottom;
    let axis_length_sq = axis.length_squared();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let pixel = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let t = if axis_length_sq > f32::EPSILON {
                ((pixel - bottom).dot(axis) / axis_length_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let offset = (pixel - (bottom + axis * t)) / radius_px;
            let distance_sq = offset.length_squared();
            if distance_sq > 1.0 {
                continue;
            }
            if (1.0 - distance_sq.sqrt()) * radius_px <= OUTLINE_WIDTH_PX {
                canvas.blend(x, y, outline);
                continue;
            }
            let rgb = if is_joint_band(t) { joint_rgb } else { body_rgb };
            let normal_view = Vec3::new(offset.x, -offset.y, (1.0 - distance_sq).sqrt());
            canvas.blend(x, y, shaded(environment, rgb, to_world.transform_vector3(normal_view)));
        }
    }

    let forward = transform.rotation * Vec3::Z;
    let head = base + Vec3::Y * (height * HEAD_MARKER_HEIGHT_FRACTION) + forward * radius;
    if forward.dot(camera.eye() - head) <= 0.0 {
        return;
    }
    if let Some((marker, _)) = camera.project_to_screen(head, size) {
        let marker_radius = radius_px * HEAD_MARKER_RADIUS_FRACTION;
        fill_ellipse(
            canvas,
            marker,
            marker_radius,
            marker_radius,
            shaded(environment, joint_rgb, forward),
        );
    }
}

fn is_joint_band(t: f32) -> bool {
    JOINT_BANDS
        .iter()
        .any(|band| (t - band).abs() <= JOINT_BAND_HALF_WIDTH)
}

fn draw_selection_ring(canvas: &mut Canvas<'_>, camera: &OrbitCamera, entity: &Entity) {
    let radius = match &entity.renderable.kind {
        RenderableKind::Figure { radius, .. } => *radius,
        RenderableKind::Prop { shape, .. } => shape.bounding_radius(),
    } * SELECTION_RING_RADIUS_FACTOR;
    let base = entity.transform.position;
    let points: Vec<Vec3> = (0..=RING_SEGMENTS)
        .map(|index| {
            let angle = index as f32 / RING_SEGMENTS as f32 * TAU;
            base + Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
        })
        .collect();
    draw_world_polyline(canvas, camera, &points, SELECTION_RING_COLOR);
}

fn draw_debug_marker(canvas: &mut Canvas<'_>, camera: &OrbitCamera, marker: &DebugMarker) {
    match marker.kind {
        DebugMarkerKind::Destination => {
            let p = marker.position_world;
            let h = DESTINATION_MARKER_HALF_SIZE;
            draw_world_polyline(
                canvas,
                camera,
                &[p + Vec3::new(-h, 0.0, -h), p + Vec3::new(h, 0.0, h)],
                DESTINATION_MARKER_COLOR,
            );
            draw_world_polyline(
                canvas,
                camera,
                &[p + Vec3::new(-h, 0.0, h), p + Vec3::new(h, 0.0, -h)],
                DESTINATION_MARKER_COLOR,
            );
        }
    }
}
