use serenity::model::prelude::UserId;
use shuttle_secrets::SecretStore;
use std::collections::HashSet;

use super::consts::DEFAULT_PREFIX;
use crate::error::CfgError;

/// Which shared cache holds the XP cooldown markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CooldownStore {
    Postgres,
    Memory,
}

/// Bot-wide configuration, read once from the secret store.
#[derive(Debug, Clone)]
pub(crate) struct BotCfg {
    pub(crate) discord_token: String,
    pub(crate) discord_prefix: String,
    pub(crate) cooldown_store: CooldownStore,
    /// Users allowed to run owner-only commands.
    pub(crate) owners: HashSet<UserId>,
}

impl BotCfg {
    pub(crate) fn new(secret_store: &SecretStore) -> Result<Self, CfgError> {
        Self::from_lookup(|key| secret_store.get(key))
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, CfgError> {
        let discord_token = get("DISCORD_TOKEN").ok_or(CfgError::MissingSecret("DISCORD_TOKEN"))?;
        let discord_prefix = get("DISCORD_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_owned());
        let cooldown_store = match get("COOLDOWN_STORE").as_deref() {
            None | Some("postgres") => CooldownStore::Postgres,
            Some("memory") => CooldownStore::Memory,
            Some(other) => return Err(CfgError::UnknownCooldownStore(other.to_owned())),
        };
        // malformed ids are skipped rather than failing startup
        let owners = get("OWNER_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|id| id.trim().parse::<u64>().ok())
            .map(UserId)
            .collect();

        Ok(Self {
            discord_token,
            discord_prefix,
            cooldown_store,
            owners,
        })
    }
}
