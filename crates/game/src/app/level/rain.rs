use engine::{groups, Cooldown, Entity, EntityKind, EntityRegistry, Rect, Sprite, Vec2, ZLayer};
use rand::Rng;

const DROP_INTERVAL_MS: u32 = 50;
const SPLASH_INTERVAL_MS: u32 = 100;
const DROPS_PER_BURST: usize = 10;
const SPLASHES_PER_BURST: usize = 3;
const VARIANTS: u32 = 3;
const DROP_SIZE: (i32, i32) = (8, 24);
const SPLASH_SIZE: (i32, i32) = (32, 16);

pub(super) fn drop_key(variant: u32) -> String {
    format!("graphics/rain/drops/{variant}.png")
}

pub(super) fn splash_key(variant: u32) -> String {
    format!("graphics/rain/floor/{variant}.png")
}

pub(super) fn image_keys() -> Vec<String> {
    (0..VARIANTS).flat_map(|variant| [drop_key(variant), splash_key(variant)]).collect()
}

/// Spawns falling drops above the world and short-lived splashes on the ground while it rains.
#[derive(Debug, Clone)]
pub(super) struct Rain {
    drops: Cooldown,
    splashes: Cooldown,
}

impl Default for Rain {
    fn default() -> Self {
        Self {
            drops: Cooldown::from_millis(DROP_INTERVAL_MS),
            splashes: Cooldown::from_millis(SPLASH_INTERVAL_MS),
        }
    }
}

impl Rain {
    /// Returns how many sprites were spawned this tick.
    pub(super) fn update(
        &mut self,
        dt: f32,
        registry: &mut EntityRegistry,
        bounds: Rect,
        rng: &mut impl Rng,
    ) -> usize {
        self.drops.tick(dt);
        self.splashes.tick(dt);
        if bounds.is_empty() {
            return 0;
        }

        let mut spawned = 0;
        if self.drops.activate() {
            for _ in 0..DROPS_PER_BURST {
                registry.spawn_into(falling_drop(bounds, &mut *rng), &[groups::RENDER]);
            }
            spawned += DROPS_PER_BURST;
        }
        if self.splashes.activate() {
            for _ in 0..SPLASHES_PER_BURST {
                registry.spawn_into(splash(bounds, &mut *rng), &[groups::RENDER]);
            }
            spawned += SPLASHES_PER_BURST;
        }
        spawned
    }
}

/// Starts just above the top edge and lives until it has fallen past the bottom edge.
fn falling_drop(bounds: Rect, rng: &mut impl Rng) -> Entity {
    let x = rng.gen_range(bounds.left()..=bounds.right());
    let y = bounds.top() + rng.gen_range(-50..-10);
    let speed = rng.gen_range(200.0..250.0_f32);
    let velocity = Vec2::new(
        rng.gen_range(-2..=2) as f32 * speed,
        rng.gen_range(4..=6) as f32 * speed,
    );
    let remaining = (bounds.bottom() - y) as f32 / velocity.y;
    Entity::new(
        Rect::new(x, y, DROP_SIZE.0, DROP_SIZE.1),
        ZLayer::RainDrops,
        EntityKind::RainDrop {
            velocity,
            remaining,
        },
    )
    .with_sprite(Sprite::from_key(&drop_key(rng.gen_range(0..VARIANTS))))
}

fn splash(bounds: Rect, rng: &mut impl Rng) -> Entity {
    let x = rng.gen_range(bounds.left()..=bounds.right());
    let y = rng.gen_range(bounds.top()..=bounds.bottom());
    Entity::new(
        Rect::new(x, y, SPLASH_SIZE.0, SPLASH_SIZE.1),
        ZLayer::RainFloor,
        EntityKind::RainDrop {
            velocity: Vec2::ZERO,
            remaining: rng.gen_range(0.4..0.5),
        },
    )
    .with_sprite(Sprite::from_key(&splash_key(rng.gen_range(0..VARIANTS))))
}
