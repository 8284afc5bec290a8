//! Rasterizes a report panel (title block plus two-column rows) to an RGB
//! image using the 8x8 bitmap glyphs from `font8x8`.

use anyhow::Context;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

pub const WHITE: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);
pub const INK: Rgb<u8> = Rgb([0x1e, 0x29, 0x3b]);
pub const MUTED: Rgb<u8> = Rgb([0x64, 0x74, 0x8b]);
pub const ACCENT: Rgb<u8> = Rgb([0x0e, 0xa5, 0xe9]);
pub const GOOD: Rgb<u8> = Rgb([0x16, 0x65, 0x34]);
pub const BAD: Rgb<u8> = Rgb([0x99, 0x1b, 0x1b]);
const RULE: Rgb<u8> = Rgb([0xe2, 0xe8, 0xf0]);

// Base (scale 1) metrics in pixels.
const GLYPH_MAG: u32 = 2;
const PADDING: u32 = 20;
const LINE_HEIGHT: u32 = 24;
const MIN_COLUMNS: usize = 24;
const MAX_COLUMNS: usize = 64;

#[derive(Debug, Clone)]
pub struct Row {
    pub left: String,
    pub right: String,
    pub color: Rgb<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Panel {
    pub title: String,
    pub subtitle: Option<String>,
    pub headline: Option<String>,
    pub rows: Vec<Row>,
}

impl Panel {
    fn header_lines(&self) -> Vec<(&str, Rgb<u8>)> {
        let mut out = vec![(self.title.as_str(), INK)];
        if let Some(s) = &self.subtitle {
            out.push((s.as_str(), MUTED));
        }
        if let Some(h) = &self.headline {
            out.push((h.as_str(), ACCENT));
        }
        out
    }

    fn columns(&self) -> usize {
        let header = self
            .header_lines()
            .iter()
            .map(|(t, _)| t.chars().count())
            .max()
            .unwrap_or(0);
        let rows = self
            .rows
            .iter()
            .map(|r| r.left.chars().count() + 2 + r.right.chars().count())
            .max()
            .unwrap_or(0);
        header.max(rows).clamp(MIN_COLUMNS, MAX_COLUMNS)
    }
}

/// Cuts `text` to at most `max` characters, marking the cut with "...".
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&"..."[..max.min(3)]);
    out
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn draw_text(img: &mut RgbImage, text: &str, x: u32, y: u32, unit: u32, color: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as u32 * 8 * unit;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for bit in 0..8u32 {
                if bits & (1 << bit) != 0 {
                    fill_rect(
                        img,
                        origin_x + bit * unit,
                        y + row as u32 * unit,
                        unit,
                        unit,
                        color,
                    );
                }
            }
        }
    }
}

pub fn render_panel(panel: &Panel, scale: u32) -> RgbImage {
    let scale = scale.max(1);
    let unit = GLYPH_MAG * scale;
    let cell = 8 * unit;
    let pad = PADDING * scale;
    let line_h = LINE_HEIGHT * scale;
    let cols = panel.columns() as u32;

    let header = panel.header_lines();
    let lines = header.len() as u32 + panel.rows.len() as u32;
    let width = pad * 2 + cols * cell;
    let height = pad * 2 + lines * line_h + scale;
    let mut img = RgbImage::from_pixel(width, height, WHITE);

    let glyph_offset = (line_h - cell) / 2;
    let mut y = pad;
    for (text, color) in &header {
        let text = clip(text, cols as usize);
        let len = text.chars().count() as u32;
        let x = pad + (cols - len) * cell / 2;
        draw_text(&mut img, &text, x, y + glyph_offset, unit, *color);
        y += line_h;
    }
    if !panel.rows.is_empty() {
        fill_rect(&mut img, pad, y, width - 2 * pad, scale, RULE);
        y += scale;
    }
    for row in &panel.rows {
        let right = clip(&row.right, cols as usize);
        let right_len = right.chars().count();
        let left = clip(&row.left, (cols as usize).saturating_sub(right_len + 2));
        draw_text(&mut img, &left, pad, y + glyph_offset, unit, INK);
        let x = pad + (cols - right_len as u32) * cell;
        draw_text(&mut img, &right, x, y + glyph_offset, unit, row.color);
        y += line_h;
    }
    img
}

pub fn save_png(img: &RgbImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write png {}", path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Panel {
        Panel {
            title: "Daily Attendance Report".to_string(),
            subtitle: Some("2024-03-15".to_string()),
            headline: None,
            rows: vec![Row {
                left: "Amina".to_string(),
                right: "Present".to_string(),
                color: GOOD,
            }],
        }
    }

    #[test]
    fn doubling_scale_doubles_dimensions() {
        let one = render_panel(&sample(), 1);
        let two = render_panel(&sample(), 2);
        assert_eq!(two.width(), one.width() * 2);
        assert_eq!(two.height(), one.height() * 2);
    }

    #[test]
    fn background_is_white_and_text_is_drawn() {
        let img = render_panel(&sample(), 2);
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        assert_eq!(*img.get_pixel(img.width() - 1, img.height() - 1), WHITE);
        assert!(img.pixels().any(|p| *p == GOOD));
        assert!(img.pixels().any(|p| *p == INK));
    }

    #[test]
    fn unknown_glyphs_fall_back() {
        assert_eq!(glyph('\u{4e2d}'), glyph('?'));
        assert_ne!(glyph('A'), [0; 8]);
    }

    #[test]
    fn long_names_are_clipped_to_the_panel_width() {
        let mut panel = sample();
        panel.rows[0].left = "A".repeat(100_000);
        let img = render_panel(&panel, 1);
        let max_width = 2 * PADDING + MAX_COLUMNS as u32 * 8 * GLYPH_MAG;
        assert_eq!(img.width(), max_width);
        assert_eq!(clip("Amina Yusuf", 8), "Amina...");
        assert_eq!(clip("Amina", 8), "Amina");
    }
}
