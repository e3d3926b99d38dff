use std::collections::{BTreeMap, HashMap};

use engine::{
    AssetResolver, Cooldown, CropKind, Entity, EntityHandle, EntityKind, InputAction,
    InputSnapshot, Item, Rect, Sprite, Vec2, ZLayer,
};

use super::settings::FarmSettings;

pub(crate) const PLAYER_SIZE: (i32, i32) = (128, 128);
const ANIMATION_FPS: f32 = 4.0;
const MAX_ANIMATION_FRAMES: u32 = 16;

const TOOL_USE_MS: u32 = 350;
const TOOL_SWITCH_MS: u32 = 200;
const SEED_USE_MS: u32 = 350;
const SEED_SWITCH_MS: u32 = 200;
const INTERACTION_MS: u32 = 300;
const PLANT_ENERGY_COST: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    const ALL: [Facing; 4] = [Facing::Up, Facing::Down, Facing::Left, Facing::Right];

    fn name(self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }

    /// Where a tool lands, relative to the footprint center.
    pub(crate) fn tool_offset(self) -> Vec2 {
        match self {
            Facing::Left => Vec2::new(-50.0, 40.0),
            Facing::Right => Vec2::new(50.0, 40.0),
            Facing::Up => Vec2::new(0.0, -10.0),
            Facing::Down => Vec2::new(0.0, 50.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tool {
    Hoe,
    Axe,
    Water,
}

impl Tool {
    const ALL: [Tool; 3] = [Tool::Hoe, Tool::Axe, Tool::Water];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Tool::Hoe => "hoe",
            Tool::Axe => "axe",
            Tool::Water => "water",
        }
    }

    pub(crate) fn energy_cost(self) -> u32 {
        match self {
            Tool::Hoe | Tool::Water => 1,
            Tool::Axe => 2,
        }
    }
}

/// Work the player finished this tick. Resolved against the world by the level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlayerAction {
    UseTool { tool: Tool, target: Vec2 },
    PlantSeed { crop: CropKind, target: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlayerIntent {
    pub(crate) direction: Vec2,
    pub(crate) interact: bool,
}

impl PlayerIntent {
    const IDLE: PlayerIntent = PlayerIntent {
        direction: Vec2::ZERO,
        interact: false,
    };
}

#[derive(Debug, Clone)]
pub(crate) struct Player {
    pub(crate) handle: EntityHandle,
    facing: Facing,
    direction: Vec2,
    tool: Tool,
    seed: CropKind,
    tool_use: Cooldown,
    tool_switch: Cooldown,
    seed_use: Cooldown,
    seed_switch: Cooldown,
    interaction: Cooldown,
    energy: u32,
    max_energy: u32,
    inventory: BTreeMap<Item, u32>,
    seeds: BTreeMap<CropKind, u32>,
    pub(crate) money: u32,
    pub(crate) sleeping: bool,
    frame: f32,
    frame_counts: HashMap<String, u32>,
}

impl Player {
    pub(crate) fn new(handle: EntityHandle, settings: &FarmSettings) -> Self {
        Self {
            handle,
            facing: Facing::Down,
            direction: Vec2::ZERO,
            tool: Tool::Hoe,
            seed: CropKind::Corn,
            tool_use: Cooldown::from_millis(TOOL_USE_MS),
            tool_switch: Cooldown::from_millis(TOOL_SWITCH_MS),
            seed_use: Cooldown::from_millis(SEED_USE_MS),
            seed_switch: Cooldown::from_millis(SEED_SWITCH_MS),
            interaction: Cooldown::from_millis(INTERACTION_MS),
            energy: settings.max_energy,
            max_energy: settings.max_energy,
            inventory: settings.starting_items.clone(),
            seeds: settings.starting_seeds.clone(),
            money: settings.starting_money,
            sleeping: false,
            frame: 0.0,
            frame_counts: HashMap::new(),
        }
    }

    pub(crate) fn entity(center: Vec2) -> Entity {
        let footprint = Rect::new(0, 0, PLAYER_SIZE.0, PLAYER_SIZE.1).with_center(center);
        Entity::new(footprint, ZLayer::Main, EntityKind::Player)
            .with_hitbox(footprint.bottom_centered(0.3, 0.15))
            .with_sprite(Sprite::from_key(&frame_key("down_idle", 0)))
    }

    pub(crate) fn facing(&self) -> Facing {
        self.facing
    }

    pub(crate) fn tool(&self) -> Tool {
        self.tool
    }

    pub(crate) fn seed(&self) -> CropKind {
        self.seed
    }

    pub(crate) fn energy(&self) -> u32 {
        self.energy
    }

    pub(crate) fn has_energy(&self) -> bool {
        self.energy > 0
    }

    pub(crate) fn spend_energy(&mut self, amount: u32) {
        self.energy = self.energy.saturating_sub(amount);
    }

    pub(crate) fn restore_energy(&mut self) {
        self.energy = self.max_energy;
    }

    pub(crate) fn item_count(&self, item: Item) -> u32 {
        self.inventory.get(&item).copied().unwrap_or(0)
    }

    pub(crate) fn add_item(&mut self, item: Item, amount: u32) {
        *self.inventory.entry(item).or_insert(0) += amount;
    }

    pub(crate) fn remove_item(&mut self, item: Item, amount: u32) -> bool {
        match self.inventory.get_mut(&item) {
            Some(count) if *count >= amount => {
                *count -= amount;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn seed_count(&self, crop: CropKind) -> u32 {
        self.seeds.get(&crop).copied().unwrap_or(0)
    }

    pub(crate) fn add_seeds(&mut self, crop: CropKind, amount: u32) {
        *self.seeds.entry(crop).or_insert(0) += amount;
    }

    /// Turns held keys into movement and cooldown starts. Nothing gets through while a tool
    /// swing is in progress or the player is asleep.
    pub(crate) fn read_input(&mut self, input: &InputSnapshot) -> PlayerIntent {
        if self.tool_use.is_active() || self.sleeping {
            self.direction = Vec2::ZERO;
            return PlayerIntent::IDLE;
        }

        let mut direction = Vec2::ZERO;
        if input.is_down(InputAction::MoveUp) {
            direction.y = -1.0;
            self.facing = Facing::Up;
        } else if input.is_down(InputAction::MoveDown) {
            direction.y = 1.0;
            self.facing = Facing::Down;
        }
        if input.is_down(InputAction::MoveRight) {
            direction.x = 1.0;
            self.facing = Facing::Right;
        } else if input.is_down(InputAction::MoveLeft) {
            direction.x = -1.0;
            self.facing = Facing::Left;
        }

        if input.is_down(InputAction::UseTool) {
            self.tool_use.activate();
            direction = Vec2::ZERO;
            self.frame = 0.0;
        }
        if input.is_down(InputAction::SwitchTool) && self.tool_switch.activate() {
            self.tool = next_in(&Tool::ALL, self.tool);
        }
        if input.is_down(InputAction::UseSeed) {
            self.seed_use.activate();
            direction = Vec2::ZERO;
            self.frame = 0.0;
        }
        if input.is_down(InputAction::SwitchSeed) && self.seed_switch.activate() {
            self.seed = next_in(&CropKind::ALL, self.seed);
        }

        self.direction = direction;
        PlayerIntent {
            direction,
            interact: input.just_pressed(InputAction::Interact) && !self.interaction.is_active(),
        }
    }

    /// Called once an interaction found its target.
    pub(crate) fn mark_interacted(&mut self) {
        self.interaction.activate();
    }

    pub(crate) fn fall_asleep(&mut self) {
        self.sleeping = true;
        self.facing = Facing::Left;
        self.direction = Vec2::ZERO;
    }

    /// Runs the cooldowns and reports the swings and plantings that completed. Targets are
    /// taken from `footprint` at completion time.
    pub(crate) fn tick(&mut self, dt: f32, footprint: Rect) -> Vec<PlayerAction> {
        let target = footprint.center() + self.facing.tool_offset();
        let mut actions = Vec::new();
        if self.tool_use.tick(dt) && self.has_energy() {
            actions.push(PlayerAction::UseTool {
                tool: self.tool,
                target,
            });
        }
        if self.seed_use.tick(dt) && self.has_energy() && self.seed_count(self.seed) > 0 {
            actions.push(PlayerAction::PlantSeed {
                crop: self.seed,
                target,
            });
        }
        self.tool_switch.tick(dt);
        self.seed_switch.tick(dt);
        self.interaction.tick(dt);
        actions
    }

    /// Consumes one seed and the planting energy after a successful planting.
    pub(crate) fn planted(&mut self, crop: CropKind) {
        if let Some(count) = self.seeds.get_mut(&crop) {
            *count = count.saturating_sub(1);
        }
        self.spend_energy(PLANT_ENERGY_COST);
    }

    pub(crate) fn status(&self) -> String {
        if self.tool_use.is_active() {
            return format!("{}_{}", self.facing.name(), self.tool.name());
        }
        if self.direction.is_zero() {
            return format!("{}_idle", self.facing.name());
        }
        self.facing.name().to_string()
    }

    pub(crate) fn set_frame_counts(&mut self, counts: HashMap<String, u32>) {
        self.frame_counts = counts;
    }

    pub(crate) fn frame_keys(&self) -> Vec<String> {
        frame_keys(&self.frame_counts)
    }

    /// Advances the walk cycle and returns the sprite for this tick.
    pub(crate) fn animate(&mut self, dt: f32) -> Option<Sprite> {
        let status = self.status();
        let frames = self.frame_counts.get(&status).copied().unwrap_or(1).max(1);
        self.frame += ANIMATION_FPS * dt;
        if self.frame >= frames as f32 {
            self.frame = 0.0;
        }
        Sprite::from_key(&frame_key(&status, self.frame as u32))
    }
}

fn next_in<T: Copy + PartialEq>(cycle: &[T], current: T) -> T {
    let index = cycle.iter().position(|entry| *entry == current).unwrap_or(0);
    cycle[(index + 1) % cycle.len()]
}

fn frame_key(status: &str, frame: u32) -> String {
    format!("graphics/character/{status}/{frame}.png")
}

pub(crate) fn animation_statuses() -> Vec<String> {
    let mut statuses = Vec::new();
    for facing in Facing::ALL {
        statuses.push(facing.name().to_string());
        statuses.push(format!("{}_idle", facing.name()));
        for tool in Tool::ALL {
            statuses.push(format!("{}_{}", facing.name(), tool.name()));
        }
    }
    statuses
}

/// Counts the consecutive `0.png, 1.png, ...` frames present for every animation.
pub(crate) fn discover_frame_counts(assets: &AssetResolver) -> HashMap<String, u32> {
    animation_statuses()
        .into_iter()
        .map(|status| {
            let count = (0..MAX_ANIMATION_FRAMES)
                .take_while(|frame| assets.resolve(&frame_key(&status, *frame)).is_file())
                .count() as u32;
            (status, count)
        })
        .collect()
}

pub(crate) fn frame_keys(counts: &HashMap<String, u32>) -> Vec<String> {
    let mut keys: Vec<String> = counts
        .iter()
        .flat_map(|(status, count)| (0..(*count).max(1)).map(move |frame| frame_key(status, frame)))
        .collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use engine::EntityRegistry;
    use tempfile::TempDir;

    const TICK: f32 = 1.0 / 60.0;

    fn player() -> Player {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn(Player::entity(Vec2::new(200.0, 200.0)));
        Player::new(handle, &FarmSettings::default())
    }

    fn held(actions: &[InputAction]) -> InputSnapshot {
        actions
            .iter()
            .fold(InputSnapshot::empty(), |snapshot, action| {
                snapshot.with_action_down(*action, true)
            })
    }

    fn run_ticks(player: &mut Player, seconds: f32) -> Vec<PlayerAction> {
        let footprint = Rect::new(0, 0, 128, 128);
        let mut actions = Vec::new();
        let mut elapsed = 0.0;
        while elapsed < seconds {
            actions.extend(player.tick(TICK, footprint));
            elapsed += TICK;
        }
        actions
    }

    #[test]
    fn horizontal_keys_win_the_facing() {
        let mut player = player();
        let intent = player.read_input(&held(&[InputAction::MoveUp, InputAction::MoveLeft]));
        assert_eq!(intent.direction, Vec2::new(-1.0, -1.0));
        assert_eq!(player.facing(), Facing::Left);
        assert_eq!(player.status(), "left");
    }

    #[test]
    fn tool_swing_freezes_input_and_lands_on_expiry() {
        let mut player = player();
        let intent = player.read_input(&held(&[InputAction::UseTool, InputAction::MoveRight]));
        assert_eq!(intent.direction, Vec2::ZERO);
        assert_eq!(player.status(), "right_hoe");

        let blocked = player.read_input(&held(&[InputAction::MoveDown]));
        assert_eq!(blocked, PlayerIntent::IDLE);
        assert_eq!(player.facing(), Facing::Right);

        let actions = run_ticks(&mut player, 0.5);
        assert_eq!(
            actions,
            vec![PlayerAction::UseTool {
                tool: Tool::Hoe,
                target: Vec2::new(64.0 + 50.0, 64.0 + 40.0),
            }]
        );
        assert_eq!(player.status(), "right_idle");
    }

    #[test]
    fn switching_tools_is_rate_limited() {
        let mut player = player();
        let switch = held(&[InputAction::SwitchTool]);
        player.read_input(&switch);
        player.read_input(&switch);
        assert_eq!(player.tool(), Tool::Axe);

        run_ticks(&mut player, 0.25);
        player.read_input(&switch);
        assert_eq!(player.tool(), Tool::Water);
        run_ticks(&mut player, 0.25);
        player.read_input(&switch);
        assert_eq!(player.tool(), Tool::Hoe);
    }

    #[test]
    fn seed_use_requires_seeds() {
        let mut settings = FarmSettings::default();
        settings.starting_seeds.insert(CropKind::Corn, 0);
        let mut player = Player::new(player().handle, &settings);

        player.read_input(&held(&[InputAction::UseSeed]));
        assert!(run_ticks(&mut player, 0.5).is_empty());

        player.add_seeds(CropKind::Corn, 1);
        player.read_input(&held(&[InputAction::UseSeed]));
        let actions = run_ticks(&mut player, 0.5);
        assert!(matches!(
            actions.as_slice(),
            [PlayerAction::PlantSeed {
                crop: CropKind::Corn,
                ..
            }]
        ));

        let energy = player.energy();
        player.planted(CropKind::Corn);
        assert_eq!(player.seed_count(CropKind::Corn), 0);
        assert_eq!(player.energy(), energy - 2);
    }

    #[test]
    fn exhausted_player_cannot_work() {
        let mut player = player();
        player.spend_energy(1_000);
        assert_eq!(player.energy(), 0);
        player.read_input(&held(&[InputAction::UseTool]));
        assert!(run_ticks(&mut player, 0.5).is_empty());
        player.restore_energy();
        assert_eq!(player.energy(), 100);
    }

    #[test]
    fn interaction_is_gated_by_its_cooldown() {
        let mut player = player();
        let interact = InputSnapshot::empty().with_action_pressed(InputAction::Interact);
        assert!(player.read_input(&interact).interact);
        player.mark_interacted();
        assert!(!player.read_input(&interact).interact);
        run_ticks(&mut player, 0.35);
        assert!(player.read_input(&interact).interact);
    }

    #[test]
    fn sleeping_player_ignores_input() {
        let mut player = player();
        player.fall_asleep();
        assert_eq!(player.read_input(&held(&[InputAction::MoveDown])), PlayerIntent::IDLE);
        assert_eq!(player.status(), "left_idle");
    }

    #[test]
    fn inventory_refuses_to_go_negative() {
        let mut player = player();
        assert_eq!(player.item_count(Item::Wood), 20);
        assert!(player.remove_item(Item::Wood, 20));
        assert!(!player.remove_item(Item::Wood, 1));
        player.add_item(Item::Wood, 3);
        assert_eq!(player.item_count(Item::Wood), 3);
    }

    #[test]
    fn animation_wraps_at_the_frame_count() {
        let mut player = player();
        player.set_frame_counts(HashMap::from([("down_idle".to_string(), 2)]));
        let key = |sprite: Option<Sprite>| sprite.map(|sprite| sprite.image.as_str().to_string());

        assert_eq!(
            key(player.animate(0.1)).as_deref(),
            Some("graphics/character/down_idle/0.png")
        );
        assert_eq!(
            key(player.animate(0.2)).as_deref(),
            Some("graphics/character/down_idle/1.png")
        );
        assert_eq!(
            key(player.animate(0.3)).as_deref(),
            Some("graphics/character/down_idle/0.png")
        );
    }

    #[test]
    fn frame_discovery_counts_consecutive_files() {
        let temp = TempDir::new().expect("temp");
        let dir = temp.path().join("graphics").join("character").join("up");
        fs::create_dir_all(&dir).expect("dir");
        for frame in ["0.png", "1.png", "3.png"] {
            fs::write(dir.join(frame), b"png").expect("frame");
        }
        let counts = discover_frame_counts(&AssetResolver::new(temp.path()));
        assert_eq!(counts.get("up"), Some(&2));
        assert_eq!(counts.get("down_axe"), Some(&0));
        assert_eq!(counts.len(), 20);
        assert!(frame_keys(&counts).contains(&"graphics/character/down_axe/0.png".to_string()));
    }
}
