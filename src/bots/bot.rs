use serenity::{
    async_trait,
    http::Http,
    model::prelude::{Message, Ready},
    prelude::{Context, EventHandler},
};
use shuttle_secrets::SecretStore;
use sqlx::{Executor, PgPool};
use std::sync::Arc;

use super::{cfg_ext::impl_cfg_ext, CfgExt};
use crate::{
    app_state::type_map_keys::{GuildCfgsKey, LevelingKey},
    error::Error,
    immut_data::dynamic::{BotCfg, CooldownStore},
    leveling::{
        cooldown::{CooldownCache, LocalCooldowns, PgCooldowns},
        platform::SerenityPlatform,
        store::PgProgressStore,
        IncomingMessage, Leveling,
    },
};

/// The bot structure that is used to handle [EventHandler] events.
///
/// Commands do not have direct access to the [Bot] struct and use
/// [Context::data] instead.
pub(crate) struct Bot {
    /// Database connection pool for PostgreSQL database.
    pub(crate) pool: PgPool,
    /// The configuration of the bot.
    pub(crate) cfg: BotCfg,
}

impl Bot {
    /// Creates a new instance of the bot and makes sure the schema exists.
    pub(crate) async fn new(pool: PgPool, secret_store: &SecretStore) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let cfg = BotCfg::new(secret_store).context("Failed to read the bot configuration")?;
        pool.execute(crate::immut_data::consts::SCHEMA)
            .await
            .context("Failed to initialize database")?;
        Ok(Self { pool, cfg })
    }

    /// Wires the leveling core to Postgres and the given Discord client.
    pub(crate) fn leveling(pool: &PgPool, cfg: &BotCfg, http: Arc<Http>) -> Leveling {
        let cooldowns: Arc<dyn CooldownCache> = match cfg.cooldown_store {
            CooldownStore::Postgres => Arc::new(PgCooldowns::new(pool.clone())),
            CooldownStore::Memory => Arc::new(LocalCooldowns::new()),
        };
        Leveling::new(
            Arc::new(PgProgressStore::new(pool.clone())),
            cooldowns,
            Arc::new(SerenityPlatform::new(http)),
        )
    }
}

impl_cfg_ext!(Bot);

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let bot_name: &str = &ready.user.name;
        tracing::info!(
            guilds = ready.guilds.len(),
            cooldown_store = ?self.cooldown_store(),
            "{bot_name} is ready to hand out experience"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.content.starts_with(self.discord_prefix()) {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let (leveling, guild_cfgs) = {
            let rlock = ctx.data.read().await;
            match (rlock.get::<LevelingKey>(), rlock.get::<GuildCfgsKey>()) {
                (Some(leveling), Some(guild_cfgs)) => (leveling.clone(), guild_cfgs.clone()),
                _ => {
                    tracing::error!("Leveling state is missing from the typemap");
                    return;
                }
            }
        };

        let cfg = match guild_cfgs.get_or_load(&self.pool, guild_id).await {
            Ok(Some(cfg)) => cfg,
            Ok(None) => return,
            // already logged when the configuration was loaded
            Err(Error::Cfg(_)) => return,
            Err(e) => {
                tracing::error!(%guild_id, "Failed to load the leveling configuration: {e}");
                return;
            }
        };

        let incoming = IncomingMessage {
            guild_id,
            channel_id: msg.channel_id,
            user_id: msg.author.id,
            username: msg.author.name.clone(),
            roles: msg.member.as_ref().map(|m| m.roles.clone()),
        };
        if let Err(e) = leveling.handle_message(&cfg, &incoming).await {
            tracing::warn!(%guild_id, user_id = %msg.author.id, "No XP for this message: {e}");
        }
    }
}
