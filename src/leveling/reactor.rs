use serenity::model::prelude::{ChannelId, GuildId, RoleId, UserId};

use super::{
    cfg::{LevelUpNotice, NoticeDestination, RoleReward},
    platform::{NoticeTarget, Platform},
};

/// A member whose level just went up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelUp<'a> {
    pub(crate) guild_id: GuildId,
    pub(crate) user_id: UserId,
    pub(crate) username: &'a str,
    /// Channel of the message that triggered the award.
    pub(crate) channel_id: ChannelId,
    pub(crate) level: u32,
}

/// What [`on_level_up`] managed to do.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RoleSync {
    pub(crate) granted: Vec<RoleId>,
    pub(crate) revoked: Vec<RoleId>,
    pub(crate) failed: Vec<RoleId>,
    pub(crate) notified: bool,
}

impl NoticeDestination {
    fn resolve(self, level_up: &LevelUp<'_>) -> Option<NoticeTarget> {
        match self {
            NoticeDestination::Current => Some(NoticeTarget::Channel(level_up.channel_id)),
            NoticeDestination::Channel { channel_id } => Some(NoticeTarget::Channel(channel_id)),
            NoticeDestination::DirectMessage => Some(NoticeTarget::DirectMessage(level_up.user_id)),
            NoticeDestination::Off => None,
        }
    }
}

/// Synchronizes role rewards with the new level and announces it.
///
/// Rewards of exactly the new level are granted; rewards of lower levels flagged
/// `remove_on_higher_level` are revoked. Each role call stands alone: a failure is
/// logged and recorded, the remaining calls still run.
pub(crate) async fn on_level_up(
    platform: &dyn Platform,
    level_up: &LevelUp<'_>,
    rewards: &[RoleReward],
    notice: &LevelUpNotice,
) -> RoleSync {
    let LevelUp {
        guild_id,
        user_id,
        level,
        ..
    } = *level_up;
    let mut sync = RoleSync::default();

    for reward in rewards.iter().filter(|r| r.level == level) {
        match platform.grant_role(guild_id, user_id, reward.role_id).await {
            Ok(()) => sync.granted.push(reward.role_id),
            Err(e) => {
                tracing::warn!(%guild_id, %user_id, role_id = %reward.role_id, "Failed to grant a level reward: {e}");
                sync.failed.push(reward.role_id);
            }
        }
    }

    for reward in rewards
        .iter()
        .filter(|r| r.level < level && r.remove_on_higher_level)
    {
        match platform.revoke_role(guild_id, user_id, reward.role_id).await {
            Ok(()) => sync.revoked.push(reward.role_id),
            Err(e) => {
                tracing::warn!(%guild_id, %user_id, role_id = %reward.role_id, "Failed to revoke an outgrown level reward: {e}");
                sync.failed.push(reward.role_id);
            }
        }
    }

    if let Some(target) = notice.destination.resolve(level_up) {
        let content = notice.render(user_id, level_up.username, level);
        match platform.notify(target, user_id, &content).await {
            Ok(()) => sync.notified = true,
            Err(e) => {
                tracing::warn!(%guild_id, %user_id, "Failed to send the level-up notice: {e}");
            }
        }
    }

    sync
}
