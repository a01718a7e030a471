use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Identity of a rendered composition: a monotonically increasing message
/// counter paired with a per-message scroll-step counter. A pure function
/// of which messages are visible and at what offsets, so bitmaps from a
/// prior run can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    pub message_no: u32,
    pub scroll_step: u32,
}

impl FrameId {
    /// The blank lead-in frame shown before the first message arrives.
    pub const BLANK: FrameId = FrameId {
        message_no: 0,
        scroll_step: 0,
    };

    pub fn file_name(self) -> String {
        format!("{}_{}.png", self.message_no, self.scroll_step)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.message_no, self.scroll_step)
    }
}

/// One visible message within a frame: its index into the message list and
/// its vertical offset at this scroll step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    pub message: usize,
    pub offset_y: i64,
}

/// A planned composition. Never mutated after creation; consumed exactly
/// once by the renderer, or skipped when its bitmap is already cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: FrameId,
    pub slots: Vec<FrameSlot>,
}

/// Content-addressed bitmap cache: one PNG per frame identity, in a
/// directory namespaced by scrolling mode so mode changes never collide.
#[derive(Debug, Clone)]
pub struct FrameCache {
    dir: PathBuf,
}

impl FrameCache {
    pub fn dir_name(scrolling: bool) -> &'static str {
        if scrolling {
            "frames"
        } else {
            "frames_noscroll"
        }
    }

    pub fn open(output_root: &Path, scrolling: bool) -> Result<Self> {
        let dir = output_root.join(Self::dir_name(scrolling));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: FrameId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    pub fn contains(&self, id: FrameId) -> bool {
        self.path_for(id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameCache, FrameId};

    #[test]
    fn frame_file_names_are_deterministic() {
        let id = FrameId {
            message_no: 12,
            scroll_step: 3,
        };
        assert_eq!(id.file_name(), "12_3.png");
        assert_eq!(FrameId::BLANK.file_name(), "0_0.png");
    }

    #[test]
    fn cache_reports_existing_bitmaps() {
        let root = tempfile::tempdir().expect("tempdir should create");
        let cache = FrameCache::open(root.path(), true).expect("cache dir should create");
        let id = FrameId {
            message_no: 1,
            scroll_step: 0,
        };

        assert!(!cache.contains(id));
        std::fs::write(cache.path_for(id), b"png").expect("bitmap should write");
        assert!(cache.contains(id));
    }

    #[test]
    fn scrolling_modes_use_distinct_directories() {
        assert_ne!(FrameCache::dir_name(true), FrameCache::dir_name(false));
    }
}
