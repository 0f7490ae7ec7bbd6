//! Bitmap text and panel primitives for the debug tools.

pub(crate) const GLYPH_WIDTH: i32 = 3;
pub(crate) const GLYPH_HEIGHT: i32 = 5;
pub(crate) const TEXT_SCALE: i32 = 2;
pub(crate) const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;
pub(crate) const LINE_ADVANCE: i32 = (GLYPH_HEIGHT + 2) * TEXT_SCALE;

/// Printable ASCII from `' '` to `'~'`; each entry packs five 3-bit rows,
/// top row in the highest bits.
const FONT: [u16; 95] = [
    0x0000, 0x2482, 0x5a00, 0x5f7d, 0x7ddf, 0x52a5, 0x2aab, 0x2400, //
    0x1491, 0x4494, 0x0aa8, 0x05d0, 0x0014, 0x01c0, 0x0002, 0x12a4, //
    0x7b6f, 0x2c97, 0x73e7, 0x73cf, 0x5bc9, 0x79cf, 0x79ef, 0x7292, //
    0x7bef, 0x7bcf, 0x0410, 0x0414, 0x1511, 0x0e38, 0x4454, 0x72c2, //
    0x7be7, 0x2bed, 0x6bae, 0x7927, 0x6b6e, 0x79a7, 0x79a4, 0x796f, //
    0x5bed, 0x7497, 0x726f, 0x5bad, 0x4927, 0x5fed, 0x5ffd, 0x7b6f, //
    0x6ba4, 0x7b79, 0x6bad, 0x79cf, 0x7492, 0x5b6f, 0x5b6a, 0x5bfd, //
    0x5aad, 0x5a92, 0x72a7, 0x6926, 0x4889, 0x324b, 0x2a00, 0x0007, //
    0x4400, 0x0e7f, 0x49ae, 0x0f27, 0x13ef, 0x0fa7, 0x39a4, 0x0f79, //
    0x49ad, 0x2092, 0x106a, 0x4bad, 0x4927, 0x0ded, 0x0d6d, 0x0f6f, //
    0x0d74, 0x0f79, 0x0d64, 0x0f8f, 0x2e93, 0x0b6f, 0x0b6a, 0x0b7a, //
    0x0a95, 0x0b79, 0x0e57, 0x3593, 0x2492, 0x64d6, 0x0780,
];

pub(crate) fn glyph_bits(ch: char) -> Option<u16> {
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        Some(FONT[(code - 0x20) as usize])
    } else {
        None
    }
}

pub(crate) fn text_width_px(text: &str) -> i32 {
    text.chars().count() as i32 * GLYPH_ADVANCE
}

pub(crate) fn draw_text_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
) {
    draw_text_clipped_with_fallback(frame, width, height, x, y, text, color, ' ');
}

/// Characters outside the font draw as `fallback`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_text_clipped_with_fallback(
    frame: &mut [u8],
    width: u32,
    height: u32,
    mut x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
    fallback: char,
) {
    let fallback_bits = glyph_bits(fallback).unwrap_or(0);
    for ch in text.chars() {
        let bits = glyph_bits(ch).unwrap_or(fallback_bits);
        draw_glyph(frame, width, height, x, y, bits, color);
        x += GLYPH_ADVANCE;
    }
}

fn draw_glyph(frame: &mut [u8], width: u32, height: u32, x: i32, y: i32, bits: u16, color: [u8; 4]) {
    if bits == 0 {
        return;
    }
    for row in 0..GLYPH_HEIGHT {
        let shift = (GLYPH_HEIGHT - 1 - row) * GLYPH_WIDTH;
        let row_bits = (bits >> shift) & 0b111;
        for col in 0..GLYPH_WIDTH {
            if row_bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            draw_filled_rect(
                frame,
                width,
                height,
                x + col * TEXT_SCALE,
                y + row * TEXT_SCALE,
                TEXT_SCALE,
                TEXT_SCALE,
                color,
            );
        }
    }
}

/// Source-over blend of one pixel; out-of-range coordinates are ignored.
pub(crate) fn blend_pixel(frame: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let Some(offset) = (y as usize)
        .checked_mul(width as usize)
        .and_then(|row| row.checked_add(x as usize))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    let Some(pixel) = frame.get_mut(offset..offset + 4) else {
        return;
    };
    let alpha = u16::from(color[3]);
    if alpha == 255 {
        pixel.copy_from_slice(&color);
        return;
    }
    for channel in 0..3 {
        let src = u16::from(color[channel]);
        let dst = u16::from(pixel[channel]);
        pixel[channel] = ((src * alpha + dst * (255 - alpha)) / 255) as u8;
    }
    pixel[3] = 255;
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_filled_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x = x.saturating_add(rect_width).min(width as i32);
    let end_y = y.saturating_add(rect_height).min(height as i32);
    for py in start_y..end_y {
        for px in start_x..end_x {
            blend_pixel(frame, width, height, px, py, color);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_rect_outline(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    if rect_width <= 1 || rect_height <= 1 {
        return;
    }
    let right = x + rect_width - 1;
    let bottom = y + rect_height - 1;
    draw_filled_rect(frame, width, height, x, y, rect_width, 1, color);
    draw_filled_rect(frame, width, height, x, bottom, rect_width, 1, color);
    draw_filled_rect(frame, width, height, x, y, 1, rect_height, color);
    draw_filled_rect(frame, width, height, right, y, 1, rect_height, color);
}

/// Translucent panel sized to fit `lines`, text drawn on top.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_text_panel(
    frame: &mut [u8],
    width: u32,
    height: u32,
    left: i32,
    top: i32,
    lines: &[(String, [u8; 4])],
    background: [u8; 4],
    border: [u8; 4],
) -> (i32, i32) {
    let inset = 3 * TEXT_SCALE;
    let longest = lines
        .iter()
        .map(|(line, _)| text_width_px(line))
        .max()
        .unwrap_or(0);
    let panel_width = longest + inset * 2;
    let panel_height = lines.len() as i32 * LINE_ADVANCE + inset * 2;
    draw_filled_rect(frame, width, height, left, top, panel_width, panel_height, background);
    draw_rect_outline(frame, width, height, left, top, panel_width, panel_height, border);

    let mut y = top + inset;
    for (line, color) in lines {
        draw_text_clipped(frame, width, height, left + inset, y, line, *color);
        y += LINE_ADVANCE;
    }
    (panel_width, panel_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn font_covers_printable_ascii() {
        for code in 0x21u8..=0x7e {
            let ch = char::from(code);
            assert!(
                glyph_bits(ch).is_some_and(|bits| bits != 0),
                "missing glyph for '{ch}'"
            );
        }
        assert_eq!(glyph_bits(' '), Some(0));
        assert!(glyph_bits('\u{7f}').is_none());
        assert!(glyph_bits('é').is_none());
    }

    #[test]
    fn digit_one_has_expected_rows() {
        let bits = glyph_bits('1').expect("glyph");
        let rows: Vec<u16> = (0..5).map(|row| (bits >> ((4 - row) * 3)) & 0b111).collect();
        assert_eq!(rows, vec![0b010, 0b110, 0b010, 0b010, 0b111]);
    }

    #[test]
    fn unknown_character_draws_like_space() {
        let mut frame = vec![0u8; 16 * 16 * 4];
        draw_text_clipped(&mut frame, 16, 16, 0, 0, "\u{1f642}", WHITE);
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn fallback_glyph_is_drawn_for_unknown_characters() {
        let mut frame = vec![0u8; 16 * 16 * 4];
        draw_text_clipped_with_fallback(&mut frame, 16, 16, 0, 0, "\u{1f642}", WHITE, '?');
        assert!(frame.iter().any(|byte| *byte == 255));
    }

    #[test]
    fn clipped_draws_never_write_out_of_bounds() {
        let mut frame = vec![0u8; 8 * 8 * 4];
        draw_text_clipped(&mut frame, 8, 8, -2, -2, "FPS", WHITE);
        draw_text_clipped(&mut frame, 8, 8, 64, 64, "FPS", WHITE);
        let mut tiny = vec![0u8; 4];
        draw_text_clipped(&mut tiny, 1, 1, -10, -10, "Frame", WHITE);
        let mut empty = vec![];
        draw_text_clipped(&mut empty, 0, 8, 0, 0, "Frame", WHITE);
        draw_filled_rect(&mut empty, 8, 0, 0, 0, 4, 4, WHITE);
    }

    #[test]
    fn translucent_fill_blends_with_destination() {
        let mut frame = vec![0u8; 4];
        draw_filled_rect(&mut frame, 1, 1, 0, 0, 1, 1, [255, 0, 0, 128]);
        assert_eq!(frame, vec![128, 0, 0, 255]);
    }

    #[test]
    fn panel_size_follows_longest_line() {
        let mut frame = vec![0u8; 200 * 100 * 4];
        let lines = vec![("ab".to_string(), WHITE), ("abcd".to_string(), WHITE)];
        let (panel_width, panel_height) =
            draw_text_panel(&mut frame, 200, 100, 0, 0, &lines, [0, 0, 0, 200], WHITE);
        assert_eq!(panel_width, 4 * GLYPH_ADVANCE + 6 * TEXT_SCALE);
        assert_eq!(panel_height, 2 * LINE_ADVANCE + 6 * TEXT_SCALE);
    }
}
