use serenity::{
    async_trait,
    model::prelude::{GuildId, UserId},
};
use sqlx::PgPool;

use super::MemberProgress;
use crate::{app_state::exp::Exp, db};

/// Result of adding experience to a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AddedXp {
    pub(crate) xp: Exp,
    pub(crate) total_xp: Exp,
    /// The persisted level, untouched by the addition.
    pub(crate) level: u32,
    /// Whether the member had no progress row before.
    pub(crate) created: bool,
}

/// Persistence of member progress.
#[async_trait]
pub(crate) trait ProgressStore: Send + Sync {
    async fn member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> crate::error::Result<Option<MemberProgress>>;

    /// Atomically adds `delta` to `xp` and `total_xp`, creating the row at level 0
    /// when absent. Concurrent additions must compose, never overwrite.
    async fn add_xp(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        delta: Exp,
    ) -> crate::error::Result<AddedXp>;

    /// Sets the level if, and only if, it is higher than the persisted one.
    /// Returns whether the level was raised.
    async fn raise_level(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        level: u32,
    ) -> crate::error::Result<bool>;
}

pub(crate) struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> crate::error::Result<Option<MemberProgress>> {
        let row = db::member_progress(&self.pool, guild_id, user_id).await?;
        Ok(row.map(MemberProgress::from))
    }

    async fn add_xp(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        delta: Exp,
    ) -> crate::error::Result<AddedXp> {
        let db::dao::AddedXp {
            xp,
            level,
            total_xp,
            inserted,
        } = db::add_xp(&self.pool, guild_id, user_id, delta.to_i64()).await?;
        Ok(AddedXp {
            xp: Exp::from_i64(xp),
            total_xp: Exp::from_i64(total_xp),
            level: u32::try_from(level).unwrap_or_default(),
            created: inserted,
        })
    }

    async fn raise_level(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        level: u32,
    ) -> crate::error::Result<bool> {
        let level = i32::try_from(level).unwrap_or(i32::MAX);
        Ok(db::raise_level(&self.pool, guild_id, user_id, level).await?)
    }
}
