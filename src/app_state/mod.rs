use serenity::model::prelude::GuildId;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use crate::{
    db,
    error::{CfgError, Error},
    leveling::cfg::LevelingCfg,
};

pub(crate) mod exp;
pub(crate) mod type_map_keys;

/// What is known about one guild's stored configuration.
#[derive(Clone)]
enum CachedCfg {
    /// The guild has no configuration row.
    Missing,
    Valid(Arc<LevelingCfg>),
    /// The stored row does not load; kept until an admin saves a new one.
    Invalid(CfgError),
}

/// In-memory copy of every guild's leveling configuration seen so far.
///
/// Guilds without leveling, and guilds whose stored configuration is broken,
/// are cached too, so that neither costs a query per message.
#[derive(Default)]
pub(crate) struct GuildCfgs {
    cfgs: RwLock<HashMap<GuildId, CachedCfg>>,
}

impl GuildCfgs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The guild's configuration, loaded and validated on first use.
    ///
    /// A stored configuration that fails to load is logged once and then
    /// reported as [`Error::Cfg`] on every call until it is replaced.
    pub(crate) async fn get_or_load(
        &self,
        pool: &PgPool,
        guild_id: GuildId,
    ) -> crate::error::Result<Option<Arc<LevelingCfg>>> {
        let cached = self.cfgs.read().await.get(&guild_id).cloned();
        let cached = match cached {
            Some(cached) => cached,
            None => {
                let loaded = match db::leveling_cfg(pool, guild_id).await? {
                    None => CachedCfg::Missing,
                    Some(json) => match LevelingCfg::from_json(&json) {
                        Ok(cfg) => CachedCfg::Valid(Arc::new(cfg)),
                        Err(Error::Cfg(e)) => {
                            tracing::error!(%guild_id, "Stored leveling configuration is unusable: {e}");
                            CachedCfg::Invalid(e)
                        }
                        Err(e) => return Err(e),
                    },
                };
                self.cfgs.write().await.insert(guild_id, loaded.clone());
                loaded
            }
        };
        match cached {
            CachedCfg::Missing => Ok(None),
            CachedCfg::Valid(cfg) => Ok(Some(cfg)),
            CachedCfg::Invalid(e) => Err(Error::Cfg(e)),
        }
    }

    /// Validates and persists `cfg`, then makes it the guild's live configuration.
    pub(crate) async fn save(
        &self,
        pool: &PgPool,
        guild_id: GuildId,
        cfg: LevelingCfg,
    ) -> crate::error::Result<Arc<LevelingCfg>> {
        let json = cfg.to_json()?;
        db::save_leveling_cfg(pool, guild_id, &json).await?;
        let cfg = Arc::new(cfg);
        self.cfgs
            .write()
            .await
            .insert(guild_id, CachedCfg::Valid(cfg.clone()));
        tracing::info!(%guild_id, "Leveling configuration updated");
        Ok(cfg)
    }
}
