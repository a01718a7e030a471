use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::Font;

pub const DEFAULT_REGULAR_FONT: &str = "/usr/share/fonts/truetype/msttcorefonts/verdana.ttf";
pub const DEFAULT_BOLD_FONT: &str = "/usr/share/fonts/truetype/msttcorefonts/verdanab.ttf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
}

/// The two faces used by the panel (regular body, bold sender names) at the
/// run's font size. Immutable and shared read-only across render workers.
pub struct FontSet {
    regular: Font,
    bold: Font,
    px: f32,
    line_height: u32,
}

impl FontSet {
    pub fn load(regular_path: &Path, bold_path: &Path, px: f32) -> Result<Self> {
        let regular = load_font(regular_path)?;
        let bold = load_font(bold_path)?;
        let line_height = regular
            .horizontal_line_metrics(px)
            .map(|metrics| metrics.new_line_size.ceil() as u32)
            .unwrap_or_else(|| (px * 1.2).ceil() as u32);

        Ok(Self {
            regular,
            bold,
            px,
            line_height: line_height.max(1),
        })
    }

    pub fn px(&self) -> f32 {
        self.px
    }

    pub fn line_height(&self) -> u32 {
        self.line_height
    }

    pub fn face(&self, face: Face) -> &Font {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
        }
    }

    /// Rendered pixel width of a single line.
    pub fn line_width(&self, text: &str, face: Face) -> u32 {
        self.block_size(text, face).0
    }

    /// Rendered pixel width/height of a block of newline-separated lines.
    pub fn block_size(&self, text: &str, face: Face) -> (u32, u32) {
        if text.is_empty() {
            return (0, 0);
        }

        let font = self.face(face);
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: 0.0,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Letter,
            wrap_hard_breaks: true,
        });
        layout.append(&[font], &TextStyle::new(text, self.px, 0));

        let mut width = 0_u32;
        for glyph in layout.glyphs() {
            let right = (glyph.x + glyph.width as f32).ceil();
            if right > 0.0 {
                width = width.max(right as u32);
            }
        }

        let lines = text.lines().count().max(1) as u32;
        (width, lines * self.line_height)
    }
}

fn load_font(path: &Path) -> Result<Font> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file {}", path.display()))?;
    Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))
}
