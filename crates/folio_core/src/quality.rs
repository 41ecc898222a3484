//! Adaptive quality control driven by measured frame time.
//!
//! Every frame delta goes into a bounded sliding window. Once enough samples
//! exist the mean frame time is inverted into an FPS estimate and the quality
//! scalar is nudged: down by a larger step when FPS is below the low
//! threshold, up by a smaller step when above the high threshold. Quality is
//! always clamped to `[floor, ceiling]`, so no sequence of deltas can push it
//! outside that band.

use std::collections::VecDeque;

use serde::Deserialize;

pub const QUALITY_FLOOR: f32 = 0.3;
pub const QUALITY_CEILING: f32 = 1.0;

/// Largest accepted sample window.
pub const MAX_WINDOW_CAPACITY: usize = 1024;

/// Tunable constants for the controller. None of these are contractual;
/// they are loaded from the app config and may be hot-reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub window_capacity: usize,
    pub min_samples: usize,
    pub low_fps: f64,
    pub high_fps: f64,
    pub decrease_step: f32,
    pub increase_step: f32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            window_capacity: 60,
            min_samples: 10,
            low_fps: 30.0,
            high_fps: 50.0,
            decrease_step: 0.1,
            increase_step: 0.05,
        }
    }
}

impl QualitySettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_capacity == 0 || self.window_capacity > MAX_WINDOW_CAPACITY {
            return Err(format!(
                "quality.window_capacity must be in 1..={MAX_WINDOW_CAPACITY}, got {}",
                self.window_capacity
            ));
        }
        if self.min_samples == 0 || self.min_samples > self.window_capacity {
            return Err(format!(
                "quality.min_samples must be in 1..={}, got {}",
                self.window_capacity, self.min_samples
            ));
        }
        if !(self.low_fps > 0.0 && self.low_fps <= self.high_fps) {
            return Err(format!(
                "quality thresholds must satisfy 0 < low_fps <= high_fps, got {} / {}",
                self.low_fps, self.high_fps
            ));
        }
        let step_ok = |s: f32| s.is_finite() && s > 0.0 && s <= QUALITY_CEILING - QUALITY_FLOOR;
        if !step_ok(self.decrease_step) || !step_ok(self.increase_step) {
            return Err(format!(
                "quality steps must be in (0, {}], got -{} / +{}",
                QUALITY_CEILING - QUALITY_FLOOR,
                self.decrease_step,
                self.increase_step
            ));
        }
        Ok(())
    }
}

/// A quality adjustment made by one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityChange {
    pub from: f32,
    pub to: f32,
    pub fps: f64,
}

pub struct QualityController {
    settings: QualitySettings,
    samples: VecDeque<f64>,
    quality: f32,
    fps: f64,
    running: bool,
}

impl QualityController {
    pub fn new(settings: QualitySettings) -> Self {
        Self {
            samples: VecDeque::with_capacity(settings.window_capacity.min(MAX_WINDOW_CAPACITY)),
            settings,
            quality: QUALITY_CEILING,
            fps: 0.0,
            running: false,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            log::debug!("Quality controller started at quality {:.2}", self.quality);
        }
    }

    /// Stop sampling. The window is cleared so stale samples from before the
    /// pause never mix with fresh ones. Quality is kept.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.samples.clear();
            log::debug!("Quality controller stopped at quality {:.2}", self.quality);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_quality(&self) -> f32 {
        self.quality
    }

    pub fn current_fps(&self) -> f64 {
        self.fps
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Replace the tunables. The window is trimmed to the new capacity.
    pub fn set_settings(&mut self, settings: QualitySettings) {
        self.settings = settings;
        while self.samples.len() > settings.window_capacity {
            self.samples.pop_front();
        }
    }

    /// Feed one frame delta in seconds. Returns the adjustment, if any.
    pub fn sample(&mut self, dt: f64) -> Option<QualityChange> {
        if !self.running || !dt.is_finite() || dt < 0.0 {
            return None;
        }

        if self.samples.len() >= self.settings.window_capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(dt);

        if self.samples.len() < self.settings.min_samples {
            return None;
        }

        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        // A zero mean means frames are effectively free.
        let fps = if mean > 0.0 { 1.0 / mean } else { f64::INFINITY };
        self.fps = fps;

        let from = self.quality;
        let to = if fps < self.settings.low_fps {
            (from - self.settings.decrease_step).max(QUALITY_FLOOR)
        } else if fps > self.settings.high_fps {
            (from + self.settings.increase_step).min(QUALITY_CEILING)
        } else {
            from
        };

        if to == from {
            return None;
        }
        self.quality = to;
        log::trace!("Quality {:.2} -> {:.2} at {:.1} fps", from, to, fps);
        Some(QualityChange { from, to, fps })
    }
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new(QualitySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> QualityController {
        let mut controller = QualityController::default();
        controller.start();
        controller
    }

    fn feed(controller: &mut QualityController, dt: f64, count: usize) {
        for _ in 0..count {
            controller.sample(dt);
        }
    }

    #[test]
    fn starts_at_full_quality() {
        let controller = QualityController::default();
        assert_eq!(controller.current_quality(), QUALITY_CEILING);
        assert!(!controller.is_running());
    }

    #[test]
    fn no_adjustment_before_min_samples() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 10.0, 9);
        assert_eq!(controller.current_quality(), QUALITY_CEILING);
        assert_eq!(controller.current_fps(), 0.0);
    }

    #[test]
    fn slow_frames_decrease_quality_by_step() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 20.0, 9);
        let change = controller.sample(1.0 / 20.0).expect("should adjust");
        assert_eq!(change.from, 1.0);
        assert!((change.to - 0.9).abs() < 1e-6);
        assert!((change.fps - 20.0).abs() < 1e-6);
    }

    #[test]
    fn sustained_slow_frames_stop_at_floor() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 10.0, 500);
        assert_eq!(controller.current_quality(), QUALITY_FLOOR);
    }

    #[test]
    fn fast_frames_recover_slower_than_they_drop() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 10.0, 12);
        let after_drop = controller.current_quality();
        let dropped = QUALITY_CEILING - after_drop;

        let mut recovering = running();
        recovering.quality = QUALITY_FLOOR;
        feed(&mut recovering, 1.0 / 120.0, 12);
        let recovered = recovering.current_quality() - QUALITY_FLOOR;
        assert!(recovered < dropped);
    }

    #[test]
    fn fast_frames_never_exceed_ceiling() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 240.0, 500);
        assert_eq!(controller.current_quality(), QUALITY_CEILING);
    }

    #[test]
    fn middle_band_holds_quality() {
        let mut controller = running();
        controller.quality = 0.6;
        feed(&mut controller, 1.0 / 40.0, 100);
        assert!((controller.current_quality() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn window_is_bounded() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 60.0, 500);
        assert_eq!(controller.sample_count(), 60);
    }

    #[test]
    fn adversarial_deltas_stay_in_band() {
        let mut controller = running();
        let deltas = [0.0, 0.0, 1e9, f64::NAN, -1.0, f64::INFINITY, 0.0, 1e-12, 5.0];
        for i in 0..2000 {
            controller.sample(deltas[i % deltas.len()]);
            let q = controller.current_quality();
            assert!((QUALITY_FLOOR..=QUALITY_CEILING).contains(&q), "q = {q}");
        }
    }

    #[test]
    fn all_zero_deltas_pin_to_ceiling() {
        let mut controller = running();
        controller.quality = 0.5;
        feed(&mut controller, 0.0, 200);
        assert_eq!(controller.current_quality(), QUALITY_CEILING);
        assert!(controller.current_fps().is_infinite());
    }

    #[test]
    fn huge_deltas_pin_to_floor() {
        let mut controller = running();
        feed(&mut controller, 1e6, 200);
        assert_eq!(controller.current_quality(), QUALITY_FLOOR);
    }

    #[test]
    fn changes_are_bounded_by_step() {
        let mut controller = running();
        let mut last = controller.current_quality();
        for i in 0..1000 {
            let dt = if (i / 50) % 2 == 0 { 0.2 } else { 0.001 };
            controller.sample(dt);
            let q = controller.current_quality();
            assert!((q - last).abs() <= 0.1 + 1e-6);
            last = q;
        }
    }

    #[test]
    fn stopped_controller_ignores_samples() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 60.0, 20);
        controller.stop();
        assert_eq!(controller.sample_count(), 0);
        assert_eq!(controller.sample(1.0), None);
        assert_eq!(controller.sample_count(), 0);
    }

    #[test]
    fn shrinking_window_trims_samples() {
        let mut controller = running();
        feed(&mut controller, 1.0 / 60.0, 60);
        controller.set_settings(QualitySettings {
            window_capacity: 20,
            ..QualitySettings::default()
        });
        assert_eq!(controller.sample_count(), 20);
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let settings = QualitySettings {
            low_fps: 60.0,
            high_fps: 30.0,
            ..QualitySettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(QualitySettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_oversized_window() {
        let settings = QualitySettings {
            window_capacity: 1_000_000_000_000_000,
            ..QualitySettings::default()
        };
        let err = settings.validate().expect_err("window too large");
        assert!(err.contains("window_capacity"));

        let at_limit = QualitySettings {
            window_capacity: MAX_WINDOW_CAPACITY,
            ..QualitySettings::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn unvalidated_huge_window_does_not_preallocate() {
        let mut controller = QualityController::new(QualitySettings {
            window_capacity: usize::MAX,
            ..QualitySettings::default()
        });
        controller.start();
        feed(&mut controller, 1.0 / 60.0, 20);
        assert_eq!(controller.sample_count(), 20);
    }
}
