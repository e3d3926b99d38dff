use rand::Rng;

pub(crate) const MORNING_HOUR: f32 = 6.0;
const HOURS_PER_DAY: f32 = 24.0;
const EVENING_START: f32 = 18.0;
const NIGHT_START: f32 = 22.0;

const DAY_ZENITH: [u8; 3] = [255, 255, 255];
const DAY_HORIZON: [u8; 3] = [135, 206, 235];
const NIGHT_ZENITH: [u8; 3] = [25, 25, 112];
const NIGHT_HORIZON: [u8; 3] = [0, 0, 0];
const EVENING_MAX_ALPHA: f32 = 120.0;
const NIGHT_ALPHA: u8 = 150;

/// In-game calendar. Days start at 1 and the clock at six in the morning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DayClock {
    day: u32,
    hour: f32,
    hours_per_second: f32,
}

impl DayClock {
    pub(crate) fn new(hours_per_second: f32) -> Self {
        Self {
            day: 1,
            hour: MORNING_HOUR,
            hours_per_second,
        }
    }

    pub(crate) fn day(&self) -> u32 {
        self.day
    }

    pub(crate) fn hour(&self) -> f32 {
        self.hour
    }

    /// Returns true when this step crossed midnight.
    pub(crate) fn advance(&mut self, dt: f32) -> bool {
        self.hour += self.hours_per_second * dt;
        if self.hour < HOURS_PER_DAY {
            return false;
        }
        self.hour = 0.0;
        self.day += 1;
        true
    }

    pub(crate) fn wake_next_morning(&mut self) {
        self.day += 1;
        self.hour = MORNING_HOUR;
    }

    pub(crate) fn clock_text(&self) -> String {
        let minutes = (self.hour * 60.0) as u32;
        format!("day {} {:02}:{:02}", self.day, minutes / 60, minutes % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SkyColors {
    pub(crate) zenith: [u8; 3],
    pub(crate) horizon: [u8; 3],
}

pub(crate) fn sky_colors(hour: f32) -> SkyColors {
    let hour = hour.rem_euclid(HOURS_PER_DAY);
    if (MORNING_HOUR..EVENING_START).contains(&hour) {
        SkyColors {
            zenith: DAY_ZENITH,
            horizon: DAY_HORIZON,
        }
    } else if (EVENING_START..NIGHT_START).contains(&hour) {
        let progress = (hour - EVENING_START) / (NIGHT_START - EVENING_START);
        let fade = |from: u8, drop: f32| from.saturating_sub((drop * progress) as u8);
        SkyColors {
            zenith: [fade(255, 100.0), fade(255, 100.0), fade(255, 155.0)],
            horizon: [fade(135, 97.0), fade(206, 105.0), fade(235, 46.0)],
        }
    } else {
        SkyColors {
            zenith: NIGHT_ZENITH,
            horizon: NIGHT_HORIZON,
        }
    }
}

/// Wash laid over the world after the entities. `None` in daylight.
pub(crate) fn sky_tint(hour: f32) -> Option<[u8; 4]> {
    let hour = hour.rem_euclid(HOURS_PER_DAY);
    if (MORNING_HOUR..EVENING_START).contains(&hour) {
        return None;
    }
    if (EVENING_START..NIGHT_START).contains(&hour) {
        let progress = (hour - EVENING_START) / (NIGHT_START - EVENING_START);
        let [r, g, b] = sky_colors(hour).horizon;
        let alpha = (EVENING_MAX_ALPHA * progress) as u8;
        return (alpha > 0).then_some([r, g, b, alpha]);
    }
    let [r, g, b] = NIGHT_ZENITH;
    Some([r, g, b, NIGHT_ALPHA])
}

pub(crate) fn roll_rain(rng: &mut impl Rng, chance: f64) -> bool {
    rng.gen_bool(chance.clamp(0.0, 1.0))
}
