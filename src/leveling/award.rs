use rand::Rng;
use serenity::model::prelude::{GuildId, RoleId, UserId};

use super::{cfg::LevelingCfg, store::ProgressStore};
use crate::app_state::exp::Exp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AwardOutcome {
    /// Experience added by this award, multiplier included.
    pub(crate) awarded: Exp,
    pub(crate) new_total_xp: Exp,
    pub(crate) new_level: u32,
    pub(crate) leveled_up: bool,
}

/// Experience earned by one message: a uniform draw from the configured range,
/// scaled by the first configured multiplier whose role the member holds.
///
/// Multipliers never stack.
pub(crate) fn xp_for_message(cfg: &LevelingCfg, roles: &[RoleId], rng: &mut impl Rng) -> Exp {
    let base = cfg.xp_per_message.draw(rng);
    match cfg.multiplier_for(roles) {
        Some(multiplier) => base.scaled(multiplier),
        None => base,
    }
}

/// Persists `delta` for the member and detects a level-up.
///
/// The addition is a single atomic upsert; the level write that follows only ever
/// raises the level, and reports a level-up only to the writer that raised it.
pub(crate) async fn award(
    store: &dyn ProgressStore,
    guild_id: GuildId,
    user_id: UserId,
    delta: Exp,
) -> crate::error::Result<AwardOutcome> {
    let added = store.add_xp(guild_id, user_id, delta).await?;

    if added.created {
        // A brand-new member starts at level 0 and never reports a level-up on
        // this first award, even when `delta` alone crosses a level threshold.
        // The level catches up on the member's next award.
        return Ok(AwardOutcome {
            awarded: delta,
            new_total_xp: added.total_xp,
            new_level: added.level,
            leveled_up: false,
        });
    }

    let computed = added.total_xp.level();
    let leveled_up =
        computed > added.level && store.raise_level(guild_id, user_id, computed).await?;

    Ok(AwardOutcome {
        awarded: delta,
        new_total_xp: added.total_xp,
        new_level: computed.max(added.level),
        leveled_up,
    })
}
