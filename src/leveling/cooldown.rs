use serenity::{
    async_trait,
    model::prelude::{GuildId, UserId},
};
use sqlx::PgPool;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::time::Instant;

use crate::db;

/// Identifies one member's cooldown marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CooldownKey {
    pub(crate) guild_id: GuildId,
    pub(crate) user_id: UserId,
}

/// A shared cache able to hold self-expiring markers.
#[async_trait]
pub(crate) trait CooldownCache: Send + Sync {
    /// Writes the marker with the given TTL unless an unexpired one exists.
    /// Returns whether the marker was written.
    ///
    /// Implementations must do the check and the write as one atomic step.
    async fn set_if_absent(&self, key: CooldownKey, ttl: Duration) -> crate::error::Result<bool>;

    /// Drops the marker, if any.
    async fn release(&self, key: CooldownKey) -> crate::error::Result<()>;
}

/// Decides whether a member may earn experience right now.
///
/// Fails closed: an unreachable cache is reported as an error and no slot is granted.
#[derive(Clone)]
pub(crate) struct CooldownGate {
    cache: Arc<dyn CooldownCache>,
}

impl CooldownGate {
    pub(crate) fn new(cache: Arc<dyn CooldownCache>) -> Self {
        Self { cache }
    }

    /// Consumes the member's slot for `cooldown` if it is free.
    pub(crate) async fn try_consume(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        cooldown: Duration,
    ) -> crate::error::Result<bool> {
        let key = CooldownKey { guild_id, user_id };
        self.cache.set_if_absent(key, cooldown).await
    }

    /// Hands back a slot that was consumed for an award which then failed.
    pub(crate) async fn release(&self, guild_id: GuildId, user_id: UserId) {
        let key = CooldownKey { guild_id, user_id };
        if let Err(e) = self.cache.release(key).await {
            tracing::warn!(%guild_id, %user_id, "Failed to release the XP cooldown: {e}");
        }
    }
}

/// Cooldown markers kept in the `xp_cooldowns` table, shared by every shard.
pub(crate) struct PgCooldowns {
    pool: PgPool,
}

impl PgCooldowns {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CooldownCache for PgCooldowns {
    async fn set_if_absent(&self, key: CooldownKey, ttl: Duration) -> crate::error::Result<bool> {
        let written =
            db::set_cooldown_if_absent(&self.pool, key.guild_id, key.user_id, ttl.as_secs_f64())
                .await?;
        Ok(written)
    }

    async fn release(&self, key: CooldownKey) -> crate::error::Result<()> {
        db::clear_cooldown(&self.pool, key.guild_id, key.user_id).await?;
        Ok(())
    }
}

/// Cooldown markers kept in process memory.
///
/// Only correct when a single process handles every message of a guild.
#[derive(Default)]
pub(crate) struct LocalCooldowns {
    markers: Mutex<Markers>,
}

#[derive(Default)]
struct Markers {
    expiry: HashMap<CooldownKey, Instant>,
    /// Map size that triggers the next sweep of expired markers. Doubles with the
    /// live markers left after a sweep, so sweeps stay amortized O(1) per insert.
    next_sweep_at: usize,
}

impl LocalCooldowns {
    /// Smallest map size at which expired markers are swept.
    const SWEEP_THRESHOLD: usize = 4096;

    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Markers {
    fn sweep_if_due(&mut self, now: Instant) {
        if self.expiry.len() < self.next_sweep_at.max(LocalCooldowns::SWEEP_THRESHOLD) {
            return;
        }
        self.expiry.retain(|_, expires_at| *expires_at > now);
        self.next_sweep_at = (self.expiry.len() * 2).max(LocalCooldowns::SWEEP_THRESHOLD);
    }
}

#[async_trait]
impl CooldownCache for LocalCooldowns {
    async fn set_if_absent(&self, key: CooldownKey, ttl: Duration) -> crate::error::Result<bool> {
        let now = Instant::now();
        let mut markers = self.markers.lock().unwrap_or_else(PoisonError::into_inner);
        if markers.expiry.get(&key).is_some_and(|expires_at| *expires_at > now) {
            return Ok(false);
        }
        markers.sweep_if_due(now);
        markers.expiry.insert(key, now + ttl);
        Ok(true)
    }

    async fn release(&self, key: CooldownKey) -> crate::error::Result<()> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .expiry
            .remove(&key);
        Ok(())
    }
}
