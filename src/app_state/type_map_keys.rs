use std::sync::Arc;

use serenity::{client::bridge::gateway::ShardManager, prelude::TypeMapKey};
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::{immut_data::dynamic::BotCfg, leveling::Leveling};

use super::GuildCfgs;

pub(crate) struct ShardManagerKey;
pub(crate) struct PgPoolKey;
pub(crate) struct BotCfgKey;
pub(crate) struct LevelingKey;
pub(crate) struct GuildCfgsKey;

impl TypeMapKey for ShardManagerKey {
    type Value = Arc<Mutex<ShardManager>>;
}

impl TypeMapKey for PgPoolKey {
    type Value = PgPool;
}

impl TypeMapKey for BotCfgKey {
    type Value = BotCfg;
}

impl TypeMapKey for LevelingKey {
    type Value = Arc<Leveling>;
}

impl TypeMapKey for GuildCfgsKey {
    type Value = Arc<GuildCfgs>;
}
