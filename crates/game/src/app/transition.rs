const FADE_SPEED: f32 = 2.0;
const FADE_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FadeStep {
    Idle,
    Fading,
    /// The screen just became fully covered; the caller runs the overnight reset now.
    Covered,
    Finished,
}

/// Fade to black and back. Alpha moves by `FADE_SPEED * 255` per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SleepTransition {
    alpha: f32,
    direction: f32,
    active: bool,
}

impl Default for SleepTransition {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            direction: FADE_SPEED,
            active: false,
        }
    }
}

impl SleepTransition {
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn play(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.direction = FADE_SPEED;
    }

    pub(crate) fn update(&mut self, dt: f32) -> FadeStep {
        if !self.active {
            return FadeStep::Idle;
        }
        self.alpha = (self.alpha + self.direction * 255.0 * dt).clamp(0.0, 255.0);
        if self.direction > 0.0 && self.alpha >= 255.0 {
            self.direction = -FADE_SPEED;
            return FadeStep::Covered;
        }
        if self.direction < 0.0 && self.alpha <= 0.0 {
            self.active = false;
            self.direction = FADE_SPEED;
            return FadeStep::Finished;
        }
        FadeStep::Fading
    }

    pub(crate) fn overlay(&self) -> Option<[u8; 4]> {
        if !self.active {
            return None;
        }
        let [r, g, b] = FADE_COLOR;
        Some([r, g, b, self.alpha.round() as u8])
    }
}
