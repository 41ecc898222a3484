use std::time::Instant;

/// Default spiral cap for a single frame delta, in seconds.
pub const DEFAULT_MAX_FRAME_DT: f64 = 0.25;

/// Wall-clock frame timing. One clock per rendering surface; the first
/// callback only establishes the reference instant and yields no delta.
pub struct FrameClock {
    pub max_frame_dt: f64,
    pub total_time: f64,
    pub frame_count: u64,
    pub real_dt: f64,
    last_instant: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            max_frame_dt: DEFAULT_MAX_FRAME_DT,
            total_time: 0.0,
            frame_count: 0,
            real_dt: 0.0,
            last_instant: None,
        }
    }

    /// Measure the delta since the previous callback using the wall clock.
    pub fn begin_frame(&mut self) -> Option<f64> {
        self.begin_frame_at(Instant::now())
    }

    /// Measure the delta since the previous callback at an explicit instant.
    pub fn begin_frame_at(&mut self, now: Instant) -> Option<f64> {
        let Some(last) = self.last_instant.replace(now) else {
            self.real_dt = 0.0;
            return None;
        };
        let mut dt = now.saturating_duration_since(last).as_secs_f64();

        // Spiral-of-death cap
        if dt > self.max_frame_dt {
            log::warn!(
                "Frame took {:.1}ms, capping delta to {}ms",
                dt * 1000.0,
                self.max_frame_dt * 1000.0
            );
            dt = self.max_frame_dt;
        }

        self.real_dt = dt;
        self.total_time += dt;
        self.frame_count += 1;
        Some(dt)
    }

    /// Forget the reference instant. The next frame yields no delta, so a
    /// long pause (hidden window, lost context) is not measured as one frame.
    pub fn reset(&mut self) {
        self.last_instant = None;
        self.real_dt = 0.0;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_frame_has_no_delta() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.begin_frame_at(Instant::now()), None);
        assert_eq!(clock.frame_count, 0);
    }

    #[test]
    fn delta_measures_elapsed_time() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.begin_frame_at(start);
        let dt = clock
            .begin_frame_at(start + Duration::from_millis(20))
            .expect("second frame has a delta");
        assert!((dt - 0.020).abs() < 1e-9);
        assert_eq!(clock.frame_count, 1);
        assert!((clock.total_time - 0.020).abs() < 1e-9);
    }

    #[test]
    fn long_frames_are_capped() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.begin_frame_at(start);
        let dt = clock
            .begin_frame_at(start + Duration::from_secs(5))
            .expect("delta");
        assert_eq!(dt, DEFAULT_MAX_FRAME_DT);
    }

    #[test]
    fn reset_drops_reference_instant() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.begin_frame_at(start);
        clock.begin_frame_at(start + Duration::from_millis(16));
        clock.reset();
        assert_eq!(clock.begin_frame_at(start + Duration::from_secs(3)), None);
    }

    #[test]
    fn out_of_order_instants_yield_zero() {
        let mut clock = FrameClock::new();
        let start = Instant::now() + Duration::from_secs(1);
        clock.begin_frame_at(start);
        let dt = clock
            .begin_frame_at(start - Duration::from_millis(10))
            .expect("delta");
        assert_eq!(dt, 0.0);
    }
}
