use serenity::{
    async_trait,
    http::Http,
    model::prelude::{ChannelId, GuildId, RoleId, UserId},
};
use std::sync::Arc;

use crate::util::say_wo_unintended_mentions;

/// Where a level-up notice goes once its destination is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NoticeTarget {
    Channel(ChannelId),
    DirectMessage(UserId),
}

/// The chat platform as seen by the leveling core.
#[async_trait]
pub(crate) trait Platform: Send + Sync {
    async fn member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> crate::error::Result<Vec<RoleId>>;

    /// Granting a role the member already holds succeeds.
    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> crate::error::Result<()>;

    /// Revoking a role the member does not hold succeeds.
    async fn revoke_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> crate::error::Result<()>;

    /// Sends `content`, pinging nobody but `member`.
    async fn notify(
        &self,
        target: NoticeTarget,
        member: UserId,
        content: &str,
    ) -> crate::error::Result<()>;
}

pub(crate) struct SerenityPlatform {
    http: Arc<Http>,
}

impl SerenityPlatform {
    const REWARD_REASON: &'static str = "Level reward";

    pub(crate) fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn member_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> crate::error::Result<Vec<RoleId>> {
        let member = guild_id.member(self.http.as_ref(), user_id).await?;
        Ok(member.roles)
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> crate::error::Result<()> {
        self.http
            .add_member_role(guild_id.0, user_id.0, role_id.0, Some(Self::REWARD_REASON))
            .await?;
        Ok(())
    }

    async fn revoke_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> crate::error::Result<()> {
        self.http
            .remove_member_role(guild_id.0, user_id.0, role_id.0, Some(Self::REWARD_REASON))
            .await?;
        Ok(())
    }

    async fn notify(
        &self,
        target: NoticeTarget,
        member: UserId,
        content: &str,
    ) -> crate::error::Result<()> {
        let chan: ChannelId = match target {
            NoticeTarget::Channel(channel_id) => channel_id,
            NoticeTarget::DirectMessage(user_id) => {
                user_id.create_dm_channel(self.http.as_ref()).await?.id
            }
        };
        say_wo_unintended_mentions(chan, &self.http, Some(member), content).await?;
        Ok(())
    }
}
