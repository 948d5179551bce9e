use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick (clamped).
    pub dt: f32,

    /// Sum of clamped deltas. Does not advance while the loop is suspended.
    pub elapsed: f32,

    pub frame_index: u64,
}

/// Produces `FrameTime` snapshots with a clamped delta, so stalls (debugger,
/// suspended surface) do not show up as jumps in animation.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f32,
    frame_index: u64,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_max_delta(Duration::from_millis(250))
    }

    pub fn with_max_delta(dt_max: Duration) -> Self {
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame_index: 0,
            dt_max,
        }
    }

    /// Restarts delta measurement from now. Call after resuming.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now.saturating_duration_since(self.last).min(self.dt_max).as_secs_f32();
        self.last = now;
        self.elapsed += dt;

        let ft = FrameTime {
            dt,
            elapsed: self.elapsed,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
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

    #[test]
    fn delta_is_clamped() {
        let mut clock = FrameClock::with_max_delta(Duration::from_millis(100));
        let start = clock.last;

        let ft = clock.tick_at(start + Duration::from_secs(5));
        assert!((ft.dt - 0.1).abs() < 1e-6);
        assert!((ft.elapsed - 0.1).abs() < 1e-6);
    }

    #[test]
    fn elapsed_accumulates_and_index_advances() {
        let mut clock = FrameClock::new();
        let start = clock.last;

        let a = clock.tick_at(start + Duration::from_millis(10));
        let b = clock.tick_at(start + Duration::from_millis(30));

        assert_eq!((a.frame_index, b.frame_index), (0, 1));
        assert!((b.elapsed - 0.03).abs() < 1e-5);
    }
}
