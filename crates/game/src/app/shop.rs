use engine::{CropKind, InputAction, InputSnapshot, Item};
use thiserror::Error;
use tracing::{debug, info};

use super::player::Player;
use super::settings::FarmSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShopEntry {
    BuySeed(CropKind),
    BuyFood,
    Sell(Item),
}

const ENTRIES: [ShopEntry; 7] = [
    ShopEntry::BuySeed(CropKind::Corn),
    ShopEntry::BuySeed(CropKind::Tomato),
    ShopEntry::BuyFood,
    ShopEntry::Sell(Item::Wood),
    ShopEntry::Sell(Item::Apple),
    ShopEntry::Sell(Item::Corn),
    ShopEntry::Sell(Item::Tomato),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum TradeError {
    #[error("costs {price}, only {money} on hand")]
    InsufficientFunds { price: u32, money: u32 },
    #[error("no {item} to sell")]
    OutOfStock { item: &'static str },
    #[error("{entry} has no configured price")]
    Unpriced { entry: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Trade {
    pub(crate) entry: ShopEntry,
    pub(crate) price: u32,
}

/// Trading mode. While open the level freezes movement and routes input here.
#[derive(Debug, Clone, Default)]
pub(crate) struct Shop {
    open: bool,
    selected: usize,
}

impl Shop {
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn toggle(&mut self) {
        self.open = !self.open;
        info!(open = self.open, "shop_toggled");
    }

    pub(crate) fn selected(&self) -> ShopEntry {
        ENTRIES[self.selected]
    }

    /// Up and down move the selection, the tool key trades. Returns true when the player asked
    /// to leave.
    pub(crate) fn handle_input(
        &mut self,
        input: &InputSnapshot,
        player: &mut Player,
        settings: &FarmSettings,
    ) -> bool {
        if input.just_pressed(InputAction::MoveUp) {
            self.selected = (self.selected + ENTRIES.len() - 1) % ENTRIES.len();
        } else if input.just_pressed(InputAction::MoveDown) {
            self.selected = (self.selected + 1) % ENTRIES.len();
        } else if input.just_pressed(InputAction::UseTool) {
            match execute(self.selected(), player, settings) {
                Ok(trade) => info!(
                    entry = ?trade.entry,
                    price = trade.price,
                    money = player.money,
                    "trade_completed"
                ),
                Err(error) => debug!(entry = ?self.selected(), error = %error, "trade_rejected"),
            }
        }
        input.just_pressed(InputAction::Interact)
    }
}

pub(crate) fn execute(
    entry: ShopEntry,
    player: &mut Player,
    settings: &FarmSettings,
) -> Result<Trade, TradeError> {
    match entry {
        ShopEntry::BuySeed(crop) => {
            let price = settings
                .purchase_price(crop)
                .ok_or(TradeError::Unpriced { entry: crop.name() })?;
            pay(player, price)?;
            player.add_seeds(crop, 1);
            Ok(Trade { entry, price })
        }
        ShopEntry::BuyFood => {
            let price = settings.food_price;
            pay(player, price)?;
            player.restore_energy();
            Ok(Trade { entry, price })
        }
        ShopEntry::Sell(item) => {
            let price = settings
                .sale_price(item)
                .ok_or(TradeError::Unpriced { entry: item.name() })?;
            if !player.remove_item(item, 1) {
                return Err(TradeError::OutOfStock { item: item.name() });
            }
            player.money += price;
            Ok(Trade { entry, price })
        }
    }
}

fn pay(player: &mut Player, price: u32) -> Result<(), TradeError> {
    if player.money < price {
        return Err(TradeError::InsufficientFunds {
            price,
            money: player.money,
        });
    }
    player.money -= price;
    Ok(())
}
