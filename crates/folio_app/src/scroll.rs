//! Virtual page scrolling.
//!
//! The page is every section stacked top to bottom, one viewport tall each.
//! The window is the viewport into that page; the rendering surface is fixed
//! to the window, so in page coordinates it moves with the scroll offset.

use folio_core::section::SectionKey;
use folio_core::visibility::Rect;

/// The active section is the one spanning this line below the viewport top.
pub const SECTION_PROBE_PX: f32 = 100.0;

/// Scroll movement smaller than this is jitter, not walking.
pub const WALK_THRESHOLD_PX: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAnimation {
    Walking,
    Idle,
}

impl ScrollAnimation {
    pub fn request_name(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Idle => "idle",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrollEvents {
    pub section_changed: Option<SectionKey>,
    pub animation: Option<ScrollAnimation>,
}

#[derive(Debug)]
pub struct ScrollTracker {
    width: f32,
    height: f32,
    offset: f32,
    pending_delta: f32,
    idle_secs: f64,
    since_scroll: f64,
    walking: bool,
    active: SectionKey,
}

impl ScrollTracker {
    pub fn new(width: f32, height: f32, idle_secs: f64) -> Self {
        Self {
            width,
            height,
            offset: 0.0,
            pending_delta: 0.0,
            idle_secs,
            since_scroll: 0.0,
            walking: false,
            active: SectionKey::Hero,
        }
    }

    pub fn set_idle_secs(&mut self, idle_secs: f64) {
        self.idle_secs = idle_secs;
    }

    /// The window resized. Keeps the same section in view.
    pub fn resize(&mut self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let progress = if self.height > 0.0 {
            self.offset / self.height
        } else {
            0.0
        };
        self.width = width;
        self.height = height;
        self.offset = (progress * height).clamp(0.0, self.max_offset());
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn active_section(&self) -> SectionKey {
        self.active
    }

    pub fn page_height(&self) -> f32 {
        self.height * SectionKey::ALL.len() as f32
    }

    fn max_offset(&self) -> f32 {
        (self.page_height() - self.height).max(0.0)
    }

    /// Fraction of the whole page scrolled, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        let max = self.max_offset();
        if max <= 0.0 {
            0.0
        } else {
            self.offset / max
        }
    }

    pub fn viewport(&self) -> Rect {
        Rect::new(0.0, self.offset, self.width, self.height)
    }

    pub fn section_rect(&self, section: SectionKey) -> Rect {
        Rect::new(
            0.0,
            section.index() as f32 * self.height,
            self.width,
            self.height,
        )
    }

    pub fn scroll_by(&mut self, pixels: f32) {
        if !pixels.is_finite() {
            return;
        }
        let before = self.offset;
        self.offset = (self.offset + pixels).clamp(0.0, self.max_offset());
        self.pending_delta += self.offset - before;
    }

    /// Jump so `section` starts at the top of the viewport.
    pub fn scroll_to(&mut self, section: SectionKey) {
        let target = self.section_rect(section).y.min(self.max_offset());
        self.scroll_by(target - self.offset);
    }

    /// Place `section` at the top without producing scroll or section events.
    pub fn jump_to(&mut self, section: SectionKey) {
        self.offset = self.section_rect(section).y.min(self.max_offset());
        self.active = self.section_at_probe();
    }

    fn section_at_probe(&self) -> SectionKey {
        let probe = self.offset + SECTION_PROBE_PX.min(self.height * 0.5);
        SectionKey::ALL
            .iter()
            .copied()
            .find(|&s| {
                let rect = self.section_rect(s);
                rect.y <= probe && rect.bottom() >= probe
            })
            .unwrap_or(self.active)
    }

    /// Consume this frame's scrolling. Section changes and walk/idle
    /// switches are reported once, on the edge.
    pub fn update(&mut self, dt: f64) -> ScrollEvents {
        let mut events = ScrollEvents::default();

        let section = self.section_at_probe();
        if section != self.active {
            self.active = section;
            events.section_changed = Some(section);
        }

        let delta = std::mem::take(&mut self.pending_delta);
        if delta.abs() > WALK_THRESHOLD_PX {
            self.since_scroll = 0.0;
            if !self.walking {
                self.walking = true;
                events.animation = Some(ScrollAnimation::Walking);
            }
        } else if self.walking {
            self.since_scroll += dt;
            if self.since_scroll >= self.idle_secs {
                self.walking = false;
                events.animation = Some(ScrollAnimation::Idle);
            }
        }

        events
    }
}
