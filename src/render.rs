use std::collections::HashMap;
use std::fs;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::{CoordinateSystem, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};
use fontdue::Font;
use image::RgbaImage;
use rayon::prelude::*;

use crate::config::PanelGeometry;
use crate::fonts::{Face, FontSet};
use crate::frame::{Frame, FrameCache};
use crate::message::ChatMessage;

pub const PANEL_BG: [u8; 4] = [0, 0, 0, 255];
pub const BORDER_COLOR: [u8; 4] = [128, 128, 128, 255];
pub const BODY_COLOR: [u8; 4] = [255, 255, 255, 255];

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

/// Rasterized-glyph cache. One per render worker; never shared across
/// threads.
pub struct GlyphPainter {
    cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl GlyphPainter {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Draw a block of newline-separated text at (x, y). The y offset may
    /// be negative while a message scrolls off the top; glyphs clip to the
    /// panel bounds.
    fn draw_block(
        &mut self,
        pixels: &mut [u8],
        width: u32,
        height: u32,
        x: i64,
        y: i64,
        text: &str,
        color: [u8; 4],
        font: &Font,
        px: f32,
    ) {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: x as f32,
            y: y as f32,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Letter,
            wrap_hard_breaks: true,
        });
        layout.append(&[font], &TextStyle::new(text, px, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let glyph_bitmap = self.cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });

            blend_glyph(
                pixels,
                width,
                height,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph_bitmap,
                color,
            );
        }
    }
}

impl Default for GlyphPainter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub skipped: usize,
}

/// Frames whose bitmaps are not yet in the cache.
pub fn pending_frames<'a>(frames: &'a [Frame], cache: &FrameCache) -> Vec<&'a Frame> {
    frames
        .iter()
        .filter(|frame| !cache.contains(frame.id))
        .collect()
}

/// Render every uncached frame across the worker pool. Workers share only
/// read-only context; a failing frame aborts the whole batch with its
/// identity in the error.
pub fn render_frames(
    frames: &[Frame],
    messages: &[ChatMessage],
    panel: &PanelGeometry,
    fonts: &FontSet,
    cache: &FrameCache,
) -> Result<RenderSummary> {
    let pending = pending_frames(frames, cache);
    let skipped = frames.len() - pending.len();
    eprintln!("rendering {} frames ({} cached)", pending.len(), skipped);

    pending
        .par_iter()
        .map_init(GlyphPainter::new, |painter, frame| {
            render_frame(painter, frame, messages, panel, fonts, cache)
                .with_context(|| format!("failed to render frame {}", frame.id))
        })
        .collect::<Result<Vec<()>>>()?;

    Ok(RenderSummary {
        rendered: pending.len(),
        skipped,
    })
}

/// Render one frame to its cache path: black panel, each visible message's
/// name line and body, border drawn on top. The write goes through a temp
/// name so a finished file is always complete.
fn render_frame(
    painter: &mut GlyphPainter,
    frame: &Frame,
    messages: &[ChatMessage],
    panel: &PanelGeometry,
    fonts: &FontSet,
    cache: &FrameCache,
) -> Result<()> {
    let width = panel.width;
    let height = panel.height;
    let mut pixels = vec![0_u8; (width as usize) * (height as usize) * 4];
    fill_rect(&mut pixels, width, height, 0, 0, width, height, PANEL_BG);

    for slot in &frame.slots {
        let message = &messages[slot.message];
        let x = panel.text_margin as i64;

        painter.draw_block(
            &mut pixels,
            width,
            height,
            x,
            slot.offset_y,
            &format!("{}:", message.nick),
            message.color.rgba(),
            fonts.face(Face::Bold),
            fonts.px(),
        );
        painter.draw_block(
            &mut pixels,
            width,
            height,
            x,
            slot.offset_y + panel.name_line as i64,
            &message.body,
            BODY_COLOR,
            fonts.face(Face::Regular),
            fonts.px(),
        );
    }

    draw_panel_border(&mut pixels, width, height, panel.border, BORDER_COLOR);

    let image = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))?;

    let final_path = cache.path_for(frame.id);
    let tmp_path = final_path.with_extension("png.tmp");
    image
        .save_with_format(&tmp_path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write bitmap {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("failed to finalize bitmap {}", final_path.display()))?;
    Ok(())
}

fn fill_rect(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: [u8; 4],
) {
    let x0 = x.min(width);
    let y0 = y.min(height);
    let x1 = x0.saturating_add(w).min(width);
    let y1 = y0.saturating_add(h).min(height);

    for yy in y0..y1 {
        let row_start = (yy as usize) * (width as usize) * 4;
        for xx in x0..x1 {
            let idx = row_start + (xx as usize) * 4;
            pixels[idx..idx + 4].copy_from_slice(&color);
        }
    }
}

fn draw_panel_border(pixels: &mut [u8], width: u32, height: u32, thickness: u32, color: [u8; 4]) {
    fill_rect(pixels, width, height, 0, 0, width, thickness, color);
    fill_rect(
        pixels,
        width,
        height,
        0,
        height.saturating_sub(thickness),
        width,
        thickness,
        color,
    );
    fill_rect(pixels, width, height, 0, 0, thickness, height, color);
    fill_rect(
        pixels,
        width,
        height,
        width.saturating_sub(thickness),
        0,
        thickness,
        height,
        color,
    );
}

fn blend_glyph(
    pixels: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 4],
) {
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width as i32 {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            let idx = ((py as u32 * frame_width + px as u32) * 4) as usize;
            blend_pixel(pixels, idx, [color[0], color[1], color[2], alpha]);
        }
    }
}

fn blend_pixel(pixels: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }

    let inv_alpha = 255_u16.saturating_sub(alpha);

    for channel in 0..3 {
        let dst = u16::from(pixels[idx + channel]);
        let src_c = u16::from(src[channel]);
        pixels[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    pixels[idx + 3] = 255;
}
