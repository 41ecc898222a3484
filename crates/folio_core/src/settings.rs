//! Maps `(PerformanceTier, quality)` to the per-frame `RenderConfig`.
//!
//! Each tier owns a baseline; the quality scalar then scales the particle
//! budget and animation speed continuously, so fidelity degrades smoothly
//! under frame pressure instead of only in tier-sized steps.

use crate::quality::{QUALITY_CEILING, QUALITY_FLOOR};
use crate::tier::PerformanceTier;

/// Shadow map sizes the renderer accepts. `0` means shadows are off.
pub const SHADOW_RESOLUTIONS: &[u32] = &[0, 256, 512, 1024, 2048];

/// Sample count used when a tier antialiases.
pub const MSAA_SAMPLES: u32 = 4;

/// Per-frame rendering knobs. Always recomputed, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub particle_count: u32,
    pub shadow_resolution: u32,
    /// Playback multiplier; crossfades last `base / animation_speed`.
    pub animation_speed: f32,
    pub enable_shadows: bool,
    /// Far plane distance in world units.
    pub draw_distance: f32,
    /// 1 or `MSAA_SAMPLES`. Fixed by the tier, so it never changes within a session.
    pub msaa_samples: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        resolve(PerformanceTier::default(), QUALITY_CEILING)
    }
}

/// Tier-level starting point before quality scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBaseline {
    pub particle_budget: u32,
    pub animation_speed: f32,
    pub draw_distance: f32,
    pub antialias: bool,
}

pub fn baseline(tier: PerformanceTier) -> TierBaseline {
    match tier {
        PerformanceTier::High => TierBaseline {
            particle_budget: 200,
            animation_speed: 1.0,
            draw_distance: 100.0,
            antialias: true,
        },
        PerformanceTier::Medium => TierBaseline {
            particle_budget: 100,
            animation_speed: 1.2,
            draw_distance: 50.0,
            antialias: true,
        },
        // Low tiers get faster playback so crossfades stay short.
        PerformanceTier::Low => TierBaseline {
            particle_budget: 40,
            animation_speed: 1.5,
            draw_distance: 25.0,
            antialias: false,
        },
    }
}

fn shadow_resolution(tier: PerformanceTier, quality: f32) -> u32 {
    match tier {
        PerformanceTier::High if quality >= 0.8 => 2048,
        PerformanceTier::High if quality >= 0.5 => 1024,
        PerformanceTier::High => 512,
        PerformanceTier::Medium if quality >= 0.8 => 512,
        PerformanceTier::Medium | PerformanceTier::Low => 0,
    }
}

pub fn resolve(tier: PerformanceTier, quality: f32) -> RenderConfig {
    let quality = if quality.is_nan() {
        QUALITY_FLOOR
    } else {
        quality.clamp(QUALITY_FLOOR, QUALITY_CEILING)
    };
    let base = baseline(tier);
    let normalized = (quality - QUALITY_FLOOR) / (QUALITY_CEILING - QUALITY_FLOOR);

    let shadow_resolution = shadow_resolution(tier, quality);
    RenderConfig {
        particle_count: (base.particle_budget as f32 * quality).floor() as u32,
        shadow_resolution,
        animation_speed: base.animation_speed * (0.8 + 0.2 * normalized),
        enable_shadows: shadow_resolution > 0,
        draw_distance: base.draw_distance,
        msaa_samples: if base.antialias { MSAA_SAMPLES } else { 1 },
    }
}
