//! Game-name keyed registry of engine/parser/bot-strategy factories.
//!
//! Factory closures keyed by game name, so the core stays pluggable without
//! runtime reflection. Only `five_hundred` is registered today; the
//! registry itself does not assume that.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bot::{BotStrategy, RandomBotStrategy};
use crate::domain::{Command, Event, GameConfig, TableConfig};
use crate::error::{AppError, Result};

/// Everything the table manager needs to run one game's rules, keyed by
/// `game_name`. `parse_game_config`/`parse_table_config` accept the raw
/// JSON bodies posted over the REST surface (§6 `Config envelope`).
pub struct GameDescriptor {
    pub game_name: &'static str,
    pub default_game_config: fn() -> GameConfig,
    pub default_table_config: fn() -> TableConfig,
    pub parse_game_config: fn(serde_json::Value) -> Result<GameConfig>,
    pub parse_table_config: fn(serde_json::Value) -> Result<TableConfig>,
    pub parse_command: fn(serde_json::Value) -> Result<Command>,
    pub parse_event: fn(serde_json::Value) -> Result<Event>,
    pub bot_strategies: HashMap<&'static str, Arc<dyn BotStrategy>>,
}

impl GameDescriptor {
    pub fn bot_strategy(&self, kind: &str) -> Result<Arc<dyn BotStrategy>> {
        self.bot_strategies
            .get(kind)
            .cloned()
            .ok_or_else(|| AppError::internal("unknown_bot_strategy", format!("no bot strategy registered for kind {kind}")))
    }
}

/// Process-wide registry of `GameDescriptor`s, one per supported game.
pub struct Registry {
    games: HashMap<&'static str, GameDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        let mut games = HashMap::new();
        games.insert("five_hundred", five_hundred_descriptor());
        Registry { games }
    }

    pub fn get(&self, game_name: &str) -> Result<&GameDescriptor> {
        self.games
            .get(game_name)
            .ok_or_else(|| AppError::not_found(format!("unknown game {game_name}")))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

fn five_hundred_descriptor() -> GameDescriptor {
    let mut bot_strategies: HashMap<&'static str, Arc<dyn BotStrategy>> = HashMap::new();
    bot_strategies.insert("random", Arc::new(RandomBotStrategy));

    GameDescriptor {
        game_name: "five_hundred",
        default_game_config: GameConfig::default,
        default_table_config: TableConfig::default,
        parse_game_config: |value| serde_json::from_value(value).map_err(|e| AppError::parse("game_config", e.to_string())),
        parse_table_config: |value| serde_json::from_value(value).map_err(|e| AppError::parse("table_config", e.to_string())),
        parse_command: |value| serde_json::from_value(value).map_err(|e| AppError::parse("command", e.to_string())),
        parse_event: |value| serde_json::from_value(value).map_err(|e| AppError::parse("event", e.to_string())),
        bot_strategies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_hundred_is_registered_with_a_random_bot_strategy() {
        let registry = Registry::new();
        let descriptor = registry.get("five_hundred").unwrap();
        assert!(descriptor.bot_strategy("random").is_ok());
        assert!(descriptor.bot_strategy("does_not_exist").is_err());
    }

    #[test]
    fn unknown_game_name_is_not_found() {
        let registry = Registry::new();
        assert!(registry.get("chess").is_err());
    }
}
