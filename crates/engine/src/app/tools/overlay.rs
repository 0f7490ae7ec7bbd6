use crate::app::LoopMetricsSnapshot;

use super::params::{ParamKind, ParamSet, ParamValue};
use super::text::{draw_filled_rect, draw_text_panel, TEXT_SCALE};

const OVERLAY_PADDING: i32 = 6 * TEXT_SCALE;
const OVERLAY_TEXT_PRIMARY_COLOR: [u8; 4] = [244, 248, 252, 255];
const OVERLAY_TEXT_DIM_COLOR: [u8; 4] = [176, 198, 220, 255];
const OVERLAY_PANEL_BG_COLOR: [u8; 4] = [10, 12, 16, 210];
const OVERLAY_PANEL_BORDER_COLOR: [u8; 4] = [92, 106, 126, 255];
const PARAM_SWATCH_SIZE: i32 = 5 * TEXT_SCALE;
const PERF_SECTION_LABEL: &str = "Perf";
const SCENE_SECTION_LABEL: &str = "Scene";

#[derive(Debug, Clone)]
pub(crate) struct OverlayData {
    pub metrics: LoopMetricsSnapshot,
    pub render_fps_cap: Option<u32>,
    pub slow_frame_delay_ms: u64,
    pub entity_count: usize,
    pub scene_title: Option<String>,
    pub scene_lines: Option<Vec<String>>,
}

/// Perf and scene summary in the top-left corner.
pub(crate) fn draw_overlay(frame: &mut [u8], width: u32, height: u32, data: &OverlayData) {
    if width == 0 || height == 0 {
        return;
    }
    let lines = build_overlay_lines(data)
        .into_iter()
        .map(|line| {
            let color = overlay_line_color(&line);
            (line, color)
        })
        .collect::<Vec<_>>();
    draw_text_panel(
        frame,
        width,
        height,
        OVERLAY_PADDING,
        OVERLAY_PADDING,
        &lines,
        OVERLAY_PANEL_BG_COLOR,
        OVERLAY_PANEL_BORDER_COLOR,
    );
}

fn build_overlay_lines(data: &OverlayData) -> Vec<String> {
    let mut lines = vec![
        PERF_SECTION_LABEL.to_string(),
        format_fps_line(
            data.metrics.fps,
            data.render_fps_cap,
            data.slow_frame_delay_ms,
        ),
        format!(
            "Frame: {:.2} ms (max {:.2})",
            data.metrics.frame_time_ms, data.metrics.max_frame_time_ms
        ),
        format!(
            "upd/ren: {:.2}/{:.2} ms",
            data.metrics.update_ms, data.metrics.render_ms
        ),
        String::new(),
        SCENE_SECTION_LABEL.to_string(),
    ];
    if let Some(title) = data.scene_title.as_ref() {
        lines.push(title.clone());
    }
    lines.push(format!("Entities: {}", data.entity_count));
    if let Some(extra) = data.scene_lines.as_ref() {
        lines.extend(extra.iter().cloned());
    }
    lines
}

fn overlay_line_color(line: &str) -> [u8; 4] {
    if matches!(line, PERF_SECTION_LABEL | SCENE_SECTION_LABEL) {
        OVERLAY_TEXT_DIM_COLOR
    } else {
        OVERLAY_TEXT_PRIMARY_COLOR
    }
}

fn format_fps_line(current_fps: f32, cap: Option<u32>, slow_frame_delay_ms: u64) -> String {
    let cap_text = match cap {
        Some(value) => value.to_string(),
        None => "inf".to_string(),
    };
    format!("[{current_fps:.0} / {cap_text}] dbg+{slow_frame_delay_ms}ms")
}

/// Folder-grouped parameter listing in the top-right corner. Color values get
/// a swatch after the hex text.
pub(crate) fn draw_param_panel(frame: &mut [u8], width: u32, height: u32, params: &ParamSet) {
    if width == 0 || height == 0 || params.is_empty() {
        return;
    }
    let lines = build_param_lines(params);
    let longest = lines
        .iter()
        .map(|(line, _, _)| super::text::text_width_px(line))
        .max()
        .unwrap_or(0);
    let panel_width_estimate = longest + 6 * TEXT_SCALE + PARAM_SWATCH_SIZE + TEXT_SCALE;
    let left = (width as i32 - OVERLAY_PADDING - panel_width_estimate).max(0);

    let text_lines = lines
        .iter()
        .map(|(line, color, _)| (line.clone(), *color))
        .collect::<Vec<_>>();
    let (panel_width, _) = draw_text_panel(
        frame,
        width,
        height,
        left,
        OVERLAY_PADDING,
        &text_lines,
        OVERLAY_PANEL_BG_COLOR,
        OVERLAY_PANEL_BORDER_COLOR,
    );

    let swatch_x = left + panel_width - PARAM_SWATCH_SIZE - 3 * TEXT_SCALE;
    let mut y = OVERLAY_PADDING + 3 * TEXT_SCALE;
    for (_, _, swatch) in &lines {
        if let Some(rgb) = swatch {
            let color = [(rgb >> 16) as u8, (rgb >> 8) as u8, *rgb as u8, 255];
            draw_filled_rect(
                frame,
                width,
                height,
                swatch_x,
                y,
                PARAM_SWATCH_SIZE,
                PARAM_SWATCH_SIZE,
                color,
            );
        }
        y += super::text::LINE_ADVANCE;
    }
}

fn build_param_lines(params: &ParamSet) -> Vec<(String, [u8; 4], Option<u32>)> {
    let mut lines = Vec::with_capacity(params.len() + params.folders().len());
    for folder in params.folders() {
        lines.push((folder.to_string(), OVERLAY_TEXT_DIM_COLOR, None));
        for (spec, value) in params.iter().filter(|(spec, _)| spec.folder == folder) {
            let swatch = match (spec.kind, value) {
                (ParamKind::Color, ParamValue::Color(rgb)) => Some(rgb),
                _ => None,
            };
            lines.push((
                format!(" {} {}   ", spec.name, value.display()),
                OVERLAY_TEXT_PRIMARY_COLOR,
                swatch,
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> OverlayData {
        OverlayData {
            metrics: LoopMetricsSnapshot {
                fps: 59.6,
                frame_time_ms: 16.7,
                max_frame_time_ms: 22.0,
                update_ms: 1.25,
                render_ms: 8.5,
            },
            render_fps_cap: Some(60),
            slow_frame_delay_ms: 0,
            entity_count: 7,
            scene_title: Some("single".to_string()),
            scene_lines: Some(vec!["sel: 1".to_string()]),
        }
    }

    #[test]
    fn overlay_lines_include_perf_and_scene_sections() {
        let lines = build_overlay_lines(&data());
        assert_eq!(lines[0], "Perf");
        assert_eq!(lines[1], "[60 / 60] dbg+0ms");
        assert_eq!(lines[2], "Frame: 16.70 ms (max 22.00)");
        assert_eq!(lines[3], "upd/ren: 1.25/8.50 ms");
        assert_eq!(
            &lines[5..],
            &["Scene", "single", "Entities: 7", "sel: 1"]
        );
    }

    #[test]
    fn uncapped_fps_shows_inf() {
        assert_eq!(format_fps_line(120.4, None, 25), "[120 / inf] dbg+25ms");
    }

    #[test]
    fn param_lines_group_by_folder() {
        let mut params = ParamSet::new();
        params
            .add_number("AmbientLight", "AmbientIntensity", 0.0, 1.0, 0.01, 0.16)
            .expect("ambient");
        params
            .add_color("Material", "ToonColor", 0x18BFE3)
            .expect("toon");
        let lines = build_param_lines(&params);
        let texts: Vec<&str> = lines.iter().map(|(line, _, _)| line.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "AmbientLight",
                " AmbientIntensity 0.16   ",
                "Material",
                " ToonColor #18bfe3   "
            ]
        );
        assert_eq!(lines[3].2, Some(0x18BFE3));
    }

    #[test]
    fn drawing_is_safe_on_tiny_frames() {
        let mut params = ParamSet::new();
        params.add_color("SceneColor", "SceneColor", 0x8E8B8B).expect("color");
        let mut frame = vec![0u8; 4];
        draw_overlay(&mut frame, 1, 1, &data());
        draw_param_panel(&mut frame, 1, 1, &params);
        let mut frame = vec![0u8; 320 * 200 * 4];
        draw_param_panel(&mut frame, 320, 200, &params);
        assert!(frame.iter().any(|byte| *byte != 0));
    }
}
