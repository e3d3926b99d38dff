mod rain;
mod setup;
mod trees;

use engine::world::{InteractionKind, WorldQuery};
use engine::{
    draw_entities, groups, load_map_or_empty, move_with_collisions, AssetResolver, Camera,
    CropKind, DrawCommand, DrawList, Entity, EntityKind, EventQueue, ImageKey, InputSnapshot,
    Item, LayerCompositor, Rect, Scene, SceneCommand, TileMap, Viewport, WorldEvent,
};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use self::rain::Rain;
use self::setup::{build_world, World};
use super::player::{discover_frame_counts, PlayerAction, Tool};
use super::settings::{load_settings, FarmSettings};
use super::shop::Shop;
use super::sky::{roll_rain, sky_colors, sky_tint, DayClock};
use super::transition::{FadeStep, SleepTransition};

const HARVEST_YIELD: std::ops::RangeInclusive<u32> = 2..=3;
const HARVEST_ENERGY_COST: u32 = 1;
const ENERGY_DRAIN_AMOUNT: u32 = 1;
/// Growth stages a watered plant gains overnight.
const OVERNIGHT_GROWTH: f32 = 1.0;

/// The farm session: one map, one player, a day clock, weather and the shop.
pub(crate) struct Level {
    settings: FarmSettings,
    rng: StdRng,
    world: World,
    events: EventQueue,
    clock: DayClock,
    transition: SleepTransition,
    shop: Shop,
    raining: bool,
    rain: Rain,
    energy_timer: f32,
    exhausted: bool,
}

impl Level {
    /// An empty placeholder until [`Scene::load`] reads the settings and the map.
    pub(crate) fn new(rng: StdRng) -> Self {
        Self::with_map(FarmSettings::default(), TileMap::empty(), rng)
    }

    pub(crate) fn with_map(settings: FarmSettings, map: TileMap, mut rng: StdRng) -> Self {
        let mut world = build_world(map, &settings, &mut rng);
        let raining = roll_rain(&mut rng, settings.rain_chance);
        world.farm.daily_reset(raining);
        Self {
            clock: DayClock::new(settings.time_speed),
            settings,
            rng,
            world,
            events: EventQueue::new(),
            transition: SleepTransition::default(),
            shop: Shop::default(),
            raining,
            rain: Rain::default(),
            energy_timer: 0.0,
            exhausted: false,
        }
    }

    /// World extent in pixels; falls back to the farm grid when no tile layers were loaded.
    fn world_bounds(&self) -> Rect {
        let (width, height) = self.world.map.pixel_size();
        if width > 0 && height > 0 {
            return Rect::new(0, 0, width as i32, height as i32);
        }
        let farm = &self.world.farm;
        Rect::new(
            0,
            0,
            (farm.width() * farm.tile_size()) as i32,
            (farm.height() * farm.tile_size()) as i32,
        )
    }

    fn player_entity(&self) -> Option<&Entity> {
        self.world.registry.get(self.world.player.handle)
    }

    fn interact(&mut self) {
        let Some(footprint) = self.player_entity().map(|entity| entity.footprint) else {
            return;
        };
        let target = self
            .world
            .registry
            .alive_in_group(groups::INTERACTABLE)
            .find(|(_, entity)| entity.footprint.intersects(&footprint))
            .and_then(|(_, entity)| match entity.kind {
                EntityKind::Interaction(kind) => Some(kind),
                _ => None,
            });
        let Some(kind) = target else {
            return;
        };
        self.world.player.mark_interacted();
        self.events.push(match kind {
            InteractionKind::Trader => WorldEvent::ShopToggled,
            InteractionKind::Bed => WorldEvent::SleepRequested,
        });
    }

    fn apply_action(&mut self, action: PlayerAction) {
        let world = &mut self.world;
        match action {
            PlayerAction::UseTool {
                tool: tool @ Tool::Hoe,
                target,
            } => {
                let tilled = world.farm.till_at(target).is_ok();
                world.player.spend_energy(tool.energy_cost());
                debug!(x = target.x, y = target.y, tilled, "hoe_used");
            }
            PlayerAction::UseTool {
                tool: tool @ Tool::Water,
                target,
            } => {
                let watered = world.farm.water_at(target).is_ok();
                world.player.spend_energy(tool.energy_cost());
                debug!(x = target.x, y = target.y, watered, "watering_can_used");
            }
            PlayerAction::UseTool {
                tool: tool @ Tool::Axe,
                target,
            } => {
                let Some(chop) = trees::chop(&mut world.registry, target, &mut self.rng) else {
                    debug!(x = target.x, y = target.y, "axe_missed");
                    return;
                };
                world.player.spend_energy(tool.energy_cost());
                if chop.apple_dropped {
                    world.player.add_item(Item::Apple, 1);
                }
            }
            PlayerAction::PlantSeed { crop, target } => {
                if world.farm.plant_at(target, crop, &mut world.registry).is_ok() {
                    world.player.planted(crop);
                    debug!(crop = crop.name(), x = target.x, y = target.y, "seed_planted");
                }
            }
        }
    }

    /// Walking into a ripe plant picks it. At most one plant per tick.
    fn harvest_touching_plants(&mut self) {
        let Some(hitbox) = self.player_entity().map(|entity| entity.hitbox) else {
            return;
        };
        let ripe = self
            .world
            .registry
            .alive_in_group(groups::PLANT)
            .find_map(|(_, entity)| {
                let plant = entity.as_plant()?;
                (plant.is_harvestable() && entity.footprint.intersects(&hitbox)).then(|| {
                    (
                        plant.cell,
                        plant.crop,
                        entity.footprint,
                        entity.sprite.clone(),
                        entity.z,
                    )
                })
            });
        let Some((cell, crop, footprint, sprite, z)) = ripe else {
            return;
        };
        if self.world.farm.harvest(cell, &mut self.world.registry).is_err() {
            return;
        }

        let amount = self.rng.gen_range(HARVEST_YIELD);
        self.world.player.add_item(crop.produce(), amount);
        self.world.player.spend_energy(HARVEST_ENERGY_COST);
        trees::spawn_particle(&mut self.world.registry, footprint, sprite, z);
        info!(crop = crop.name(), amount, "crop_harvested");
    }

    fn drain_events(&mut self) {
        let pending: Vec<WorldEvent> = self.events.drain().collect();
        for event in pending {
            match event {
                WorldEvent::ItemCollected { item, amount } => {
                    self.world.player.add_item(item, amount);
                    debug!(item = item.name(), amount, "item_collected");
                }
                WorldEvent::TreeFelled { tree } => {
                    trees::clear_apples(&mut self.world.registry, tree);
                    info!("tree_felled");
                }
                WorldEvent::ShopToggled => self.shop.toggle(),
                WorldEvent::SleepRequested => {
                    if self.transition.is_active() {
                        continue;
                    }
                    self.world.player.fall_asleep();
                    self.transition.play();
                    info!(day = self.clock.day(), "sleep_started");
                }
            }
        }
    }

    fn drain_energy(&mut self, dt: f32) {
        self.energy_timer += dt;
        if self.energy_timer >= self.settings.energy_drain_interval_secs {
            self.energy_timer = 0.0;
            self.world.player.spend_energy(ENERGY_DRAIN_AMOUNT);
        }
        let exhausted = !self.world.player.has_energy();
        if exhausted && !self.exhausted {
            warn!(day = self.clock.day(), "energy_depleted");
        }
        self.exhausted = exhausted;
    }

    fn advance_transition(&mut self, dt: f32) {
        match self.transition.update(dt) {
            FadeStep::Covered => self.wake_next_morning(),
            FadeStep::Finished => self.world.player.sleeping = false,
            FadeStep::Idle | FadeStep::Fading => {}
        }
    }

    /// Runs behind the fully faded screen.
    fn wake_next_morning(&mut self) {
        let world = &mut self.world;
        let watered: Vec<_> = world
            .registry
            .alive_in_group(groups::PLANT)
            .filter_map(|(handle, entity)| {
                let plant = entity.as_plant()?;
                world.farm.is_cell_watered(plant.cell).then_some(handle)
            })
            .collect();
        for handle in &watered {
            if let Some(entity) = world.registry.get_mut(*handle) {
                entity.advance_growth(OVERNIGHT_GROWTH);
            }
        }

        self.clock.wake_next_morning();
        self.start_day("sleep");

        let trees: Vec<_> = self
            .world
            .registry
            .alive_in_group(groups::TREE)
            .map(|(handle, _)| handle)
            .collect();
        for tree in trees {
            trees::regrow_apples(&mut self.world.registry, tree, &mut self.rng);
        }
    }

    /// Water dries up, then the new day's weather decides whether rain refills it.
    fn start_day(&mut self, reason: &'static str) {
        self.raining = roll_rain(&mut self.rng, self.settings.rain_chance);
        self.world.farm.daily_reset(self.raining);
        info!(day = self.clock.day(), raining = self.raining, reason, "day_started");
    }

    fn tick_world(&mut self, dt: f32, input: &InputSnapshot) {
        let intent = self.world.player.read_input(input);
        if intent.interact {
            self.interact();
        }

        let handle = self.world.player.handle;
        move_with_collisions(
            &mut self.world.registry,
            handle,
            intent.direction,
            self.settings.player_speed,
            dt,
            groups::COLLIDABLE,
        );

        let Some(footprint) = self.player_entity().map(|entity| entity.footprint) else {
            return;
        };
        for action in self.world.player.tick(dt, footprint) {
            self.apply_action(action);
        }
        let sprite = self.world.player.animate(dt);
        if let Some(entity) = self.world.registry.get_mut(handle) {
            entity.sprite = sprite;
        }

        if self.raining {
            let bounds = self.world_bounds();
            self.rain.update(dt, &mut self.world.registry, bounds, &mut self.rng);
        }

        let world = &mut self.world;
        world.registry.update(dt, &world.farm, &mut self.events);

        if self.clock.advance(dt) {
            self.start_day("midnight");
        }
        self.harvest_touching_plants();
    }

    fn image_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .world
            .map
            .tile_resolver()
            .image_keys()
            .into_iter()
            .chain(self.world.farm.tile_resolver().image_keys())
            .map(|key| key.as_str().to_string())
            .collect();
        for crop in CropKind::ALL {
            keys.extend((0..=crop.max_stage()).map(|stage| crop.stage_key(stage)));
        }
        for size in [engine::world::TreeSize::Small, engine::world::TreeSize::Large] {
            keys.push(size.stump_key().to_string());
            keys.push(trees::standing_tree_key(size).to_string());
        }
        keys.push(trees::APPLE_KEY.to_string());
        keys.extend(self.world.player.frame_keys());
        keys.extend(rain::image_keys());
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Scene for Level {
    fn load(&mut self, assets: &AssetResolver) {
        let settings = load_settings(assets);
        let map = load_map_or_empty(assets, &settings.map_key);
        *self = Level::with_map(settings, map, self.rng.clone());
        self.world
            .player
            .set_frame_counts(discover_frame_counts(assets));
        info!(
            day = self.clock.day(),
            raining = self.raining,
            entities = self.world.registry.alive_count(),
            "level_loaded"
        );
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        if self.shop.is_open() {
            let leave = self
                .shop
                .handle_input(input, &mut self.world.player, &self.settings);
            if leave {
                self.world.player.mark_interacted();
                self.events.push(WorldEvent::ShopToggled);
            }
        } else {
            self.tick_world(fixed_dt_seconds, input);
        }
        self.drain_events();
        self.drain_energy(fixed_dt_seconds);
        self.advance_transition(fixed_dt_seconds);
        SceneCommand::None
    }

    fn render(&self, viewport: Viewport, out: &mut DrawList) {
        let Some(player) = self.player_entity() else {
            return;
        };
        let camera = Camera::focused_on(player.footprint, viewport);
        let hour = self.clock.hour();
        let [r, g, b] = sky_colors(hour).horizon;
        out.push(DrawCommand::Clear {
            color: [r, g, b, 255],
        });

        let map = &self.world.map;
        let order = self.settings.render_order();
        LayerCompositor::for_map(map).draw_named(map, &order, &camera, viewport, out);

        let farm = &self.world.farm;
        let soil = LayerCompositor::new(farm.tile_resolver(), farm.tile_size(), farm.tile_size());
        soil.draw_layer(farm.soil_layer(), &camera, viewport, out);
        soil.draw_layer(farm.water_layer(), &camera, viewport, out);

        draw_entities(&self.world.registry, groups::RENDER, &camera, viewport, out);

        if let Some(color) = sky_tint(hour) {
            out.push(DrawCommand::Overlay { color });
        }
        if let Some(color) = self.transition.overlay() {
            out.push(DrawCommand::Overlay { color });
        }
    }

    fn image_manifest(&self) -> Vec<ImageKey> {
        self.image_keys()
            .iter()
            .filter_map(|key| ImageKey::new(key).ok())
            .collect()
    }

    fn unload(&mut self) {
        info!(day = self.clock.day(), money = self.world.player.money, "level_unloaded");
    }

    fn debug_title(&self) -> Option<String> {
        let player = &self.world.player;
        Some(format!(
            "Homestead | {} | {} | energy {} | ${} | {} / {} seeds {}{}",
            self.clock.clock_text(),
            if self.raining { "rain" } else { "clear" },
            player.energy(),
            player.money,
            player.tool().name(),
            player.seed().name(),
            player.seed_count(player.seed()),
            if self.shop.is_open() { " | trading" } else { "" },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{CellFlags, GridPos, InputAction, Rect, Vec2};
    use rand::SeedableRng;

    const TICK: f32 = 1.0 / 60.0;

    fn dry_settings() -> FarmSettings {
        FarmSettings {
            rain_chance: 0.0,
            ..FarmSettings::default()
        }
    }

    fn level() -> Level {
        Level::with_map(dry_settings(), setup::tests::test_map(), StdRng::seed_from_u64(21))
    }

    fn teleport(level: &mut Level, center: Vec2) {
        let handle = level.world.player.handle;
        let entity = level.world.registry.get_mut(handle).expect("player");
        let hitbox = entity.hitbox;
        let moved = hitbox.with_center(center);
        entity.set_hitbox(moved);
        entity.position = moved.center();
    }

    fn run(level: &mut Level, seconds: f32, input: &InputSnapshot) {
        let mut elapsed = 0.0;
        while elapsed < seconds {
            level.update(TICK, input);
            elapsed += TICK;
        }
    }

    fn player_hitbox(level: &Level) -> Rect {
        level.player_entity().expect("player").hitbox
    }

    #[test]
    fn walls_stop_the_player() {
        let mut level = level();
        let walk_right = InputSnapshot::empty().with_action_down(InputAction::MoveRight, true);
        run(&mut level, 3.0, &walk_right);
        let hitbox = player_hitbox(&level);
        assert_eq!(hitbox.right(), 639);
    }

    #[test]
    fn hoe_water_and_seed_work_a_cell() {
        let mut level = level();
        let target = level.world.farm.cell_world_center(GridPos::new(3, 3));
        let energy = level.world.player.energy();

        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Hoe,
            target,
        });
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Water,
            target,
        });
        level.apply_action(PlayerAction::PlantSeed {
            crop: CropKind::Corn,
            target,
        });

        let flags = level.world.farm.flags(GridPos::new(3, 3)).expect("cell");
        assert!(flags.contains(CellFlags::TILLED | CellFlags::WATERED | CellFlags::PLANTED));
        assert_eq!(level.world.player.energy(), energy - 4);
        assert_eq!(level.world.player.seed_count(CropKind::Corn), 4);
        assert_eq!(level.world.registry.alive_in_group(groups::PLANT).count(), 1);
    }

    #[test]
    fn hoe_on_unfarmable_ground_still_costs_energy() {
        let mut level = level();
        let energy = level.world.player.energy();
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Hoe,
            target: Vec2::new(900.0, 700.0),
        });
        assert_eq!(level.world.player.energy(), energy - 1);
        assert_eq!(level.world.farm.cells_with(CellFlags::TILLED).count(), 0);
    }

    #[test]
    fn felling_a_tree_yields_wood_and_a_stump() {
        let mut level = level();
        let wood = level.world.player.item_count(Item::Wood);
        let target = Vec2::new(480.0, 500.0);
        for _ in 0..5 {
            level.apply_action(PlayerAction::UseTool {
                tool: Tool::Axe,
                target,
            });
        }
        run(&mut level, TICK, &InputSnapshot::empty());

        assert_eq!(level.world.player.item_count(Item::Wood), wood + 1);
        let (_, tree) = level
            .world
            .registry
            .alive_in_group(groups::TREE)
            .next()
            .expect("tree");
        assert!(tree.as_tree().expect("tree").stump);
        assert_eq!(level.world.registry.alive_in_group(groups::FRUIT).count(), 0);
    }

    #[test]
    fn axe_without_a_tree_costs_nothing() {
        let mut level = level();
        let energy = level.world.player.energy();
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Axe,
            target: Vec2::new(50.0, 700.0),
        });
        assert_eq!(level.world.player.energy(), energy);
    }

    #[test]
    fn trader_toggles_trading_and_freezes_movement() {
        let mut level = level();
        teleport(&mut level, Vec2::new(320.0, 150.0));
        let interact = InputSnapshot::empty().with_action_pressed(InputAction::Interact);
        level.update(TICK, &interact);
        assert!(level.shop.is_open());

        let before = player_hitbox(&level);
        let walk = InputSnapshot::empty().with_action_down(InputAction::MoveDown, true);
        run(&mut level, 0.5, &walk);
        assert_eq!(player_hitbox(&level), before);

        level.update(TICK, &interact);
        assert!(!level.shop.is_open());
    }

    #[test]
    fn sleeping_starts_a_new_morning_and_grows_watered_plants() {
        let mut level = level();
        let cell = GridPos::new(2, 2);
        let target = level.world.farm.cell_world_center(cell);
        for action in [
            PlayerAction::UseTool {
                tool: Tool::Hoe,
                target,
            },
            PlayerAction::UseTool {
                tool: Tool::Water,
                target,
            },
            PlayerAction::PlantSeed {
                crop: CropKind::Tomato,
                target,
            },
        ] {
            level.apply_action(action);
        }
        let plant = level.world.farm.plant_handle(cell).expect("plant");

        teleport(&mut level, Vec2::new(480.0, 200.0));
        let interact = InputSnapshot::empty().with_action_pressed(InputAction::Interact);
        level.update(TICK, &interact);
        assert!(level.world.player.sleeping);

        run(&mut level, 0.6, &InputSnapshot::empty());
        assert_eq!(level.clock.day(), 2);
        assert!((level.clock.hour() - 6.0).abs() < 0.5);
        assert!(!level.world.farm.is_cell_watered(cell));
        let age = level
            .world
            .registry
            .get(plant)
            .and_then(Entity::as_plant)
            .expect("plant")
            .age;
        assert!(age >= 1.0);

        run(&mut level, 0.6, &InputSnapshot::empty());
        assert!(!level.world.player.sleeping);
        assert!(!level.transition.is_active());
    }

    #[test]
    fn ripe_plants_are_picked_by_walking_into_them() {
        let mut level = level();
        let cell = GridPos::new(4, 4);
        let target = level.world.farm.cell_world_center(cell);
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Hoe,
            target,
        });
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Water,
            target,
        });
        level.apply_action(PlayerAction::PlantSeed {
            crop: CropKind::Corn,
            target,
        });
        let plant = level.world.farm.plant_handle(cell).expect("plant");
        level
            .world
            .registry
            .get_mut(plant)
            .expect("plant")
            .advance_growth(10.0);

        let corn = level.world.player.item_count(Item::Corn);
        let energy = level.world.player.energy();
        let footprint = level.world.registry.get(plant).expect("plant").footprint;
        teleport(&mut level, footprint.center());
        level.update(TICK, &InputSnapshot::empty());

        let gained = level.world.player.item_count(Item::Corn) - corn;
        assert!(HARVEST_YIELD.contains(&gained));
        assert_eq!(level.world.player.energy(), energy - 1);
        assert!(level.world.farm.plant_handle(cell).is_none());
        assert!(!level.world.registry.is_alive(plant));
    }

    #[test]
    fn energy_drains_on_the_configured_interval() {
        let mut level = Level::with_map(
            FarmSettings {
                energy_drain_interval_secs: 0.5,
                ..dry_settings()
            },
            setup::tests::test_map(),
            StdRng::seed_from_u64(4),
        );
        run(&mut level, 1.1, &InputSnapshot::empty());
        assert_eq!(level.world.player.energy(), 98);
    }

    #[test]
    fn midnight_dries_the_soil() {
        let mut level = level();
        let target = level.world.farm.cell_world_center(GridPos::new(5, 2));
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Hoe,
            target,
        });
        level.apply_action(PlayerAction::UseTool {
            tool: Tool::Water,
            target,
        });
        level.clock = DayClock::new(100.0);
        run(&mut level, 0.2, &InputSnapshot::empty());
        assert_eq!(level.clock.day(), 2);
        assert_eq!(level.world.farm.cells_with(CellFlags::WATERED).count(), 0);
        assert_eq!(level.world.farm.cells_with(CellFlags::TILLED).count(), 1);
    }

    fn rain_count(level: &Level) -> usize {
        level
            .world
            .registry
            .alive_in_group(groups::RENDER)
            .filter(|(_, entity)| matches!(entity.kind, EntityKind::RainDrop { .. }))
            .count()
    }

    #[test]
    fn rainy_days_spawn_drops_and_dry_days_do_not() {
        let mut dry = level();
        dry.update(TICK, &InputSnapshot::empty());
        assert_eq!(rain_count(&dry), 0);

        let mut wet = level();
        wet.raining = true;
        wet.update(TICK, &InputSnapshot::empty());
        assert!(wet
            .world
            .registry
            .alive_in_group(groups::RENDER)
            .any(|(_, entity)| entity.z == engine::ZLayer::RainDrops));
        assert!(wet
            .world
            .registry
            .alive_in_group(groups::RENDER)
            .any(|(_, entity)| entity.z == engine::ZLayer::RainFloor));
    }

    #[test]
    fn rain_pauses_while_trading() {
        let mut level = level();
        level.raining = true;
        level.shop.toggle();
        run(&mut level, 0.5, &InputSnapshot::empty());
        assert_eq!(rain_count(&level), 0);
    }

    #[test]
    fn render_clears_then_draws_the_player() {
        let level = level();
        let mut out = DrawList::new();
        level.render(Viewport::new(1280, 720), &mut out);

        assert!(matches!(out.commands()[0], DrawCommand::Clear { .. }));
        assert!(out
            .image_keys()
            .any(|key| key.as_str().starts_with("graphics/character/down_idle/")));
        assert!(!out
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::Overlay { .. })));
    }

    #[test]
    fn manifest_lists_every_crop_stage() {
        let level = level();
        let manifest: Vec<String> = level
            .image_manifest()
            .iter()
            .map(|key| key.as_str().to_string())
            .collect();
        assert!(manifest.contains(&"graphics/fruit/corn/3.png".to_string()));
        assert!(manifest.contains(&trees::APPLE_KEY.to_string()));
        assert!(manifest.contains(&"graphics/stumps/small.png".to_string()));
        assert!(manifest.contains(&"graphics/rain/drops/0.png".to_string()));
    }
}
