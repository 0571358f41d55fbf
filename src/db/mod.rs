use serenity::model::prelude::{GuildId, UserId};
use sqlx::PgPool;

use crate::util::macros::i64_from_id;

pub(crate) mod dao;
#[cfg(test)]
pub(crate) mod test_utils;

/// Atomically adds `delta` to both `xp` and `total_xp` of the member,
/// creating the row with `level = 0` when it does not exist yet.
pub(crate) async fn add_xp(
    pool: &PgPool,
    guild_id: GuildId,
    user_id: UserId,
    delta: i64,
) -> Result<dao::AddedXp, sqlx::Error> {
    // `xmax = 0` holds only for a freshly inserted tuple
    sqlx::query_as::<_, dao::AddedXp>(
        "INSERT INTO member_progress (guild_id, user_id, xp, total_xp, level, last_xp_gain_at) \
        VALUES ($1, $2, $3, $3, 0, now()) \
        ON CONFLICT (guild_id, user_id) \
        DO UPDATE SET xp = member_progress.xp + EXCLUDED.xp, \
            total_xp = member_progress.total_xp + EXCLUDED.total_xp, \
            last_xp_gain_at = EXCLUDED.last_xp_gain_at \
        RETURNING xp, level, total_xp, (xmax = 0) AS inserted",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(user_id))
    .bind(delta)
    .fetch_one(pool)
    .await
}

/// Raises the persisted level to `level`.
///
/// Returns `false` without writing when the stored level is already at least `level`.
pub(crate) async fn raise_level(
    pool: &PgPool,
    guild_id: GuildId,
    user_id: UserId,
    level: i32,
) -> Result<bool, sqlx::Error> {
    let raised = sqlx::query_scalar::<_, i32>(
        "UPDATE member_progress \
        SET level = $3 \
        WHERE guild_id = $1 AND user_id = $2 AND level < $3 \
        RETURNING level",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(user_id))
    .bind(level)
    .fetch_optional(pool)
    .await?;
    Ok(raised.is_some())
}

pub(crate) async fn member_progress(
    pool: &PgPool,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Option<dao::MemberProgress>, sqlx::Error> {
    sqlx::query_as::<_, dao::MemberProgress>(
        "SELECT guild_id, user_id, xp, level, total_xp, \
            EXTRACT(EPOCH FROM last_xp_gain_at)::BIGINT AS last_xp_gain_at \
        FROM member_progress \
        WHERE guild_id = $1 AND user_id = $2",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(user_id))
    .fetch_optional(pool)
    .await
}

pub(crate) async fn leaderboard(
    pool: &PgPool,
    guild_id: GuildId,
    limit: i64,
) -> Result<Vec<dao::LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, dao::LeaderboardEntry>(
        "SELECT user_id, level, total_xp FROM member_progress \
        WHERE guild_id = $1 \
        ORDER BY total_xp DESC, user_id ASC \
        LIMIT $2",
    )
    .bind(i64_from_id!(guild_id))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// 1-based position of the member in the guild's leaderboard.
pub(crate) async fn rank_position(
    pool: &PgPool,
    guild_id: GuildId,
    total_xp: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) + 1 FROM member_progress \
        WHERE guild_id = $1 AND total_xp > $2",
    )
    .bind(i64_from_id!(guild_id))
    .bind(total_xp)
    .fetch_one(pool)
    .await
}

/// Sets the cooldown marker unless an unexpired one exists.
///
/// Returns `true` when the marker was written. The whole check-and-set is a single
/// statement, so two concurrent callers can never both observe the slot as free.
pub(crate) async fn set_cooldown_if_absent(
    pool: &PgPool,
    guild_id: GuildId,
    user_id: UserId,
    ttl_secs: f64,
) -> Result<bool, sqlx::Error> {
    let written = sqlx::query_scalar::<_, bool>(
        "INSERT INTO xp_cooldowns (guild_id, user_id, expires_at) \
        VALUES ($1, $2, now() + make_interval(secs => $3)) \
        ON CONFLICT (guild_id, user_id) \
        DO UPDATE SET expires_at = EXCLUDED.expires_at \
        WHERE xp_cooldowns.expires_at <= now() \
        RETURNING true",
    )
    .bind(i64_from_id!(guild_id))
    .bind(i64_from_id!(user_id))
    .bind(ttl_secs)
    .fetch_optional(pool)
    .await?;
    Ok(written.is_some())
}

pub(crate) async fn clear_cooldown(
    pool: &PgPool,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM xp_cooldowns WHERE guild_id = $1 AND user_id = $2")
        .bind(i64_from_id!(guild_id))
        .bind(i64_from_id!(user_id))
        .execute(pool)
        .await?;
    Ok(())
}

/// Raw JSON of the guild's leveling configuration, if the guild has one.
pub(crate) async fn leveling_cfg(
    pool: &PgPool,
    guild_id: GuildId,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT config::text FROM guild_leveling WHERE guild_id = $1",
    )
    .bind(i64_from_id!(guild_id))
    .fetch_optional(pool)
    .await
}

pub(crate) async fn save_leveling_cfg(
    pool: &PgPool,
    guild_id: GuildId,
    json: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO guild_leveling (guild_id, config) \
        VALUES ($1, $2::jsonb) \
        ON CONFLICT (guild_id) \
        DO UPDATE SET config = EXCLUDED.config",
    )
    .bind(i64_from_id!(guild_id))
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}
