//! Fixed-rate simulated clock

/// Advances by `1 / target_fps` seconds per tick regardless of wall time
#[derive(Debug, Clone)]
pub struct FrameClock {
    target_fps: u32,
    time: f64,
    frame: u64,
}

impl FrameClock {
    pub fn new(target_fps: u32) -> Self {
        Self {
            target_fps: target_fps.max(1),
            time: 0.0,
            frame: 0,
        }
    }

    /// Advance one tick and return the new time in seconds.
    pub fn tick(&mut self) -> f64 {
        self.frame += 1;
        self.time = self.frame as f64 * self.dt();
        self.time
    }

    /// Seconds per tick
    pub fn dt(&self) -> f64 {
        1.0 / self.target_fps as f64
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.dt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_fixed_step() {
        let mut clock = FrameClock::new(20);
        assert_eq!(clock.time(), 0.0);
        clock.tick();
        assert!((clock.time() - 0.05).abs() < 1e-12);
        for _ in 0..19 {
            clock.tick();
        }
        assert!((clock.time() - 1.0).abs() < 1e-12);
        assert_eq!(clock.frame(), 20);
    }

    #[test]
    fn zero_rate_is_clamped() {
        let clock = FrameClock::new(0);
        assert_eq!(clock.target_fps(), 1);
        assert_eq!(clock.dt(), 1.0);
    }
}
