use std::collections::BTreeMap;
use std::io;

use engine::{AssetResolver, CropKind, Item};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const SETTINGS_KEY: &str = "data/settings.json";

const DEFAULT_RENDER_ORDER: [&str; 10] = [
    "Water",
    "Ground",
    "Hills",
    "Forest Grass",
    "Outside Decoration",
    "HouseFloor",
    "HouseWalls",
    "Fence",
    "HouseFurnitureBottom",
    "HouseFurnitureTop",
];

/// Tunables for one farming session. Every field has a default, so a settings file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FarmSettings {
    pub(crate) map_key: String,
    /// Tile layers drawn under the entities, bottom first.
    pub(crate) render_order: Vec<String>,
    pub(crate) collision_layer: String,
    pub(crate) fence_layer: String,
    pub(crate) farmable_layer: String,
    /// Game hours per real second.
    pub(crate) time_speed: f32,
    pub(crate) rain_chance: f64,
    pub(crate) energy_drain_interval_secs: f32,
    pub(crate) player_speed: f32,
    pub(crate) starting_money: u32,
    pub(crate) max_energy: u32,
    pub(crate) starting_items: BTreeMap<Item, u32>,
    pub(crate) starting_seeds: BTreeMap<CropKind, u32>,
    pub(crate) sale_prices: BTreeMap<Item, u32>,
    pub(crate) purchase_prices: BTreeMap<CropKind, u32>,
    pub(crate) food_price: u32,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            map_key: "data/map.tmx".to_string(),
            render_order: DEFAULT_RENDER_ORDER.iter().map(ToString::to_string).collect(),
            collision_layer: "Collision".to_string(),
            fence_layer: "Fence".to_string(),
            farmable_layer: "Farmable".to_string(),
            time_speed: 0.5,
            rain_chance: 0.3,
            energy_drain_interval_secs: 10.0,
            player_speed: 200.0,
            starting_money: 200,
            max_energy: 100,
            starting_items: Item::ALL.iter().map(|item| (*item, 20)).collect(),
            starting_seeds: CropKind::ALL.iter().map(|crop| (*crop, 5)).collect(),
            sale_prices: BTreeMap::from([
                (Item::Wood, 4),
                (Item::Apple, 2),
                (Item::Corn, 10),
                (Item::Tomato, 20),
            ]),
            purchase_prices: BTreeMap::from([(CropKind::Corn, 4), (CropKind::Tomato, 5)]),
            food_price: 20,
        }
    }
}

impl FarmSettings {
    pub(crate) fn sale_price(&self, item: Item) -> Option<u32> {
        self.sale_prices.get(&item).copied()
    }

    pub(crate) fn purchase_price(&self, crop: CropKind) -> Option<u32> {
        self.purchase_prices.get(&crop).copied()
    }

    pub(crate) fn render_order(&self) -> Vec<&str> {
        self.render_order.iter().map(String::as_str).collect()
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&self.rain_chance) {
            return Err(SettingsError::invalid(
                "rain_chance",
                format!("expected a probability in 0..=1, got {}", self.rain_chance),
            ));
        }
        if !self.time_speed.is_finite() || self.time_speed < 0.0 {
            return Err(SettingsError::invalid(
                "time_speed",
                format!("expected a non-negative rate, got {}", self.time_speed),
            ));
        }
        if !self.player_speed.is_finite() || self.player_speed <= 0.0 {
            return Err(SettingsError::invalid(
                "player_speed",
                format!("expected a positive speed, got {}", self.player_speed),
            ));
        }
        if !self.energy_drain_interval_secs.is_finite() || self.energy_drain_interval_secs <= 0.0 {
            return Err(SettingsError::invalid(
                "energy_drain_interval_secs",
                format!("expected a positive interval, got {}", self.energy_drain_interval_secs),
            ));
        }
        if self.max_energy == 0 {
            return Err(SettingsError::invalid("max_energy", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("read {key}: {source}")]
    Read {
        key: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("parse settings json: {message}")]
    Parse { message: String },
    #[error("parse settings json at {path}: {message}")]
    ParseAt { path: String, message: String },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub(crate) fn parse_settings(raw: &str) -> Result<FarmSettings, SettingsError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let settings = match serde_path_to_error::deserialize::<_, FarmSettings>(&mut deserializer) {
        Ok(settings) => settings,
        Err(error) => {
            let path = error.path().to_string();
            let message = error.into_inner().to_string();
            return Err(if path.is_empty() || path == "." {
                SettingsError::Parse { message }
            } else {
                SettingsError::ParseAt { path, message }
            });
        }
    };
    settings.validate()?;
    Ok(settings)
}

/// `Ok(None)` when the file does not exist.
pub(crate) fn read_settings(assets: &AssetResolver) -> Result<Option<FarmSettings>, SettingsError> {
    let raw = match assets.read_to_string(SETTINGS_KEY) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                key: SETTINGS_KEY,
                source,
            })
        }
    };
    parse_settings(&raw).map(Some)
}

/// Never fails: a missing file means defaults, a broken one is reported and replaced by them.
pub(crate) fn load_settings(assets: &AssetResolver) -> FarmSettings {
    match read_settings(assets) {
        Ok(Some(settings)) => {
            info!(key = SETTINGS_KEY, map = %settings.map_key, "settings_loaded");
            settings
        }
        Ok(None) => {
            debug!(key = SETTINGS_KEY, "settings_absent_using_defaults");
            FarmSettings::default()
        }
        Err(error) => {
            warn!(key = SETTINGS_KEY, error = %error, "settings_invalid_using_defaults");
            FarmSettings::default()
        }
    }
}
