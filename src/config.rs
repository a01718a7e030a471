use anyhow::{bail, Result};

/// Share of the video width reserved for the source footage; the chat
/// panel takes the remainder.
pub const PANEL_PADDED_PERCENT: u32 = 80;

/// Font size is derived from the video height; never smaller than this.
pub const MIN_FONT_PX: u32 = 8;
pub const FONT_HEIGHT_FRACTION: f32 = 0.024;

pub const BORDER_PX: u32 = 5;

/// Layout stops scrolling once a message's bottom edge clears the panel
/// bottom minus this margin.
pub const BOTTOM_MARGIN_PX: u32 = 4;

/// Horizontal inset for text; also bounds the wrap budget.
pub const TEXT_MARGIN_PX: u32 = 10;

/// Pixels every on-screen message shifts up per scroll step.
pub const SCROLL_SPEED_PX: i64 = 5;

/// Base display time of one scroll-step frame.
pub const STEP_DISPLAY_MS: u64 = 32;

/// Fixed geometry of the chat panel for one run. Constructed once from the
/// source video resolution and passed immutably to every component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelGeometry {
    pub width: u32,
    pub height: u32,
    pub border: u32,
    pub bottom_margin: u32,
    pub text_margin: u32,
    /// Vertical space reserved for the sender name line.
    pub name_line: u32,
    pub font_px: f32,
}

impl PanelGeometry {
    pub fn from_video(video_width: u32, video_height: u32) -> Result<Self> {
        let padded = PANEL_PADDED_PERCENT * video_width / 100;
        let width = video_width - padded;

        let font_px = ((video_height as f32 * FONT_HEIGHT_FRACTION) as u32).max(MIN_FONT_PX);
        let name_line = (font_px as f32 * 1.2).round() as u32;

        let geometry = Self {
            width,
            height: video_height,
            border: BORDER_PX,
            bottom_margin: BOTTOM_MARGIN_PX,
            text_margin: TEXT_MARGIN_PX,
            name_line,
            font_px: font_px as f32,
        };

        if geometry.wrap_budget() == 0 || video_height <= 2 * BORDER_PX + BOTTOM_MARGIN_PX {
            bail!(
                "video resolution {}x{} is too small to fit a chat panel",
                video_width,
                video_height
            );
        }
        Ok(geometry)
    }

    /// Pixel budget available to a wrapped message line.
    pub fn wrap_budget(&self) -> u32 {
        self.width.saturating_sub(self.text_margin)
    }

    /// Vertical boundary a message's bottom edge must clear to stop
    /// scrolling.
    pub fn scroll_floor(&self) -> i64 {
        (self.height - self.bottom_margin) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::PanelGeometry;

    #[test]
    fn geometry_from_720p_matches_reference_numbers() {
        let panel = PanelGeometry::from_video(1280, 720).expect("geometry should derive");
        assert_eq!(panel.width, 256);
        assert_eq!(panel.height, 720);
        assert_eq!(panel.font_px, 17.0);
        assert_eq!(panel.name_line, 20);
        assert_eq!(panel.wrap_budget(), 246);
        assert_eq!(panel.scroll_floor(), 716);
    }

    #[test]
    fn font_size_never_drops_below_floor() {
        let panel = PanelGeometry::from_video(640, 120).expect("geometry should derive");
        assert_eq!(panel.font_px, 8.0);
    }

    #[test]
    fn tiny_video_is_rejected() {
        assert!(PanelGeometry::from_video(20, 10).is_err());
    }
}
