/// Monotonic countdown gating a discrete action. Counts simulation time, never wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cooldown {
    duration: f32,
    remaining: f32,
}

impl Cooldown {
    pub fn from_millis(millis: u32) -> Self {
        Self {
            duration: millis as f32 / 1000.0,
            remaining: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    /// Starts the countdown unless it is already running.
    pub fn activate(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        self.remaining = self.duration;
        true
    }

    pub fn reset(&mut self) {
        self.remaining = 0.0;
    }

    /// Returns true on the tick the countdown reaches zero.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining = 0.0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_duration() {
        let mut cooldown = Cooldown::from_millis(350);
        assert!(cooldown.activate());
        assert!(!cooldown.tick(0.2));
        assert!(cooldown.is_active());
        assert!(cooldown.tick(0.2));
        assert!(!cooldown.is_active());
        assert!(!cooldown.tick(0.2));
    }

    #[test]
    fn activate_is_ignored_while_running() {
        let mut cooldown = Cooldown::from_millis(200);
        assert!(cooldown.activate());
        cooldown.tick(0.15);
        assert!(!cooldown.activate());
        assert!(cooldown.tick(0.06));
    }

    #[test]
    fn reset_cancels_without_firing() {
        let mut cooldown = Cooldown::from_millis(300);
        cooldown.activate();
        cooldown.reset();
        assert!(!cooldown.tick(1.0));
    }
}
