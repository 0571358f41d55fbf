//! Module for Data Acess Objects

use sqlx::FromRow;

/// Data Access Object for [`crate::leveling::MemberProgress`].
#[derive(FromRow, Debug)]
pub(crate) struct MemberProgress {
    pub(crate) guild_id: i64,
    pub(crate) user_id: i64,
    pub(crate) xp: i64,
    pub(crate) level: i32,
    pub(crate) total_xp: i64,
    /// Unix timestamp in seconds.
    pub(crate) last_xp_gain_at: i64,
}

/// Row returned by the XP upsert.
#[derive(FromRow, Debug)]
pub(crate) struct AddedXp {
    pub(crate) xp: i64,
    /// The level as persisted before this award; the upsert never touches it.
    pub(crate) level: i32,
    pub(crate) total_xp: i64,
    /// Whether the upsert created the row.
    pub(crate) inserted: bool,
}

#[derive(FromRow, Debug)]
pub(crate) struct LeaderboardEntry {
    pub(crate) user_id: i64,
    pub(crate) level: i32,
    pub(crate) total_xp: i64,
}
