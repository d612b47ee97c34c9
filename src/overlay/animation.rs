use std::time::{Duration, Instant};

/// Decelerating curve: fast start, gentle landing.
pub fn decelerate(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Horizontal slide of the pill towards an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapAnimation {
    pub from_x: i32,
    pub to_x: i32,
    pub started_at: Instant,
    pub duration: Duration,
}

impl SnapAnimation {
    pub fn new(from_x: i32, to_x: i32, started_at: Instant, duration: Duration) -> Self {
        Self {
            from_x,
            to_x,
            started_at,
            duration,
        }
    }

    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn x_at(&self, now: Instant) -> i32 {
        let eased = decelerate(self.progress(now));
        let span = (self.to_x - self.from_x) as f32;
        self.from_x + (span * eased) as i32
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}
