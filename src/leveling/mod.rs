//! Experience, levels and level rewards.
//!
//! Every accepted guild message goes through [`Leveling::handle_message`]:
//! the cooldown gate admits at most one award per member and window, the award
//! adds a random amount of experience, and a level-up synchronizes role rewards
//! and announces the new level.

use serenity::model::prelude::{ChannelId, GuildId, RoleId, UserId};
use std::{borrow::Cow, sync::Arc};

use crate::{app_state::exp::Exp, db::dao, util::macros::u64_from_i64};

use self::{
    award::AwardOutcome,
    cfg::LevelingCfg,
    cooldown::{CooldownCache, CooldownGate},
    platform::Platform,
    reactor::LevelUp,
    store::ProgressStore,
};

pub(crate) mod award;
pub(crate) mod cfg;
pub(crate) mod cooldown;
#[cfg(test)]
pub(crate) mod fakes;
pub(crate) mod platform;
pub(crate) mod reactor;
pub(crate) mod store;

/// For database operations, [`MemberProgress`] is converted to [`dao::MemberProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MemberProgress {
    pub(crate) guild_id: GuildId,
    pub(crate) user_id: UserId,
    pub(crate) xp: Exp,
    pub(crate) level: u32,
    pub(crate) total_xp: Exp,
    /// Unix timestamp in seconds.
    pub(crate) last_xp_gain_at: i64,
}

impl MemberProgress {
    /// The level earned by `total_xp`.
    ///
    /// Ahead of the persisted `level` after a member's first award, until the
    /// next award raises it.
    pub(crate) fn current_level(&self) -> u32 {
        self.total_xp.level().max(self.level)
    }
}

impl From<dao::MemberProgress> for MemberProgress {
    fn from(dao: dao::MemberProgress) -> Self {
        let dao::MemberProgress {
            guild_id,
            user_id,
            xp,
            level,
            total_xp,
            last_xp_gain_at,
        } = dao;

        MemberProgress {
            guild_id: GuildId(u64_from_i64!(guild_id)),
            user_id: UserId(u64_from_i64!(user_id)),
            xp: Exp::from_i64(xp),
            level: u32::try_from(level).unwrap_or_default(),
            total_xp: Exp::from_i64(total_xp),
            last_xp_gain_at,
        }
    }
}

/// A guild message that may earn its author experience.
#[derive(Debug, Clone)]
pub(crate) struct IncomingMessage {
    pub(crate) guild_id: GuildId,
    pub(crate) channel_id: ChannelId,
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    /// The author's roles, when the event carries them.
    pub(crate) roles: Option<Vec<RoleId>>,
}

pub(crate) struct Leveling {
    store: Arc<dyn ProgressStore>,
    gate: CooldownGate,
    platform: Arc<dyn Platform>,
}

impl Leveling {
    pub(crate) fn new(
        store: Arc<dyn ProgressStore>,
        cooldowns: Arc<dyn CooldownCache>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            store,
            gate: CooldownGate::new(cooldowns),
            platform,
        }
    }

    pub(crate) async fn progress(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> crate::error::Result<Option<MemberProgress>> {
        self.store.member(guild_id, user_id).await
    }

    /// Awards experience for one message, if the guild's configuration and the
    /// member's cooldown allow it.
    ///
    /// Returns `Ok(None)` when nothing was awarded. An error means no experience
    /// was granted for this message; the caller should not retry.
    pub(crate) async fn handle_message(
        &self,
        cfg: &LevelingCfg,
        msg: &IncomingMessage,
    ) -> crate::error::Result<Option<AwardOutcome>> {
        let IncomingMessage {
            guild_id,
            channel_id,
            user_id,
            ..
        } = *msg;

        if !cfg.enabled || cfg.ignored_channels.contains(&channel_id) {
            return Ok(None);
        }
        let roles: Cow<'_, [RoleId]> = match &msg.roles {
            Some(roles) => Cow::Borrowed(roles.as_slice()),
            None => Cow::Owned(self.platform.member_roles(guild_id, user_id).await?),
        };
        if cfg.ignores(channel_id, &roles) {
            return Ok(None);
        }

        if !self.gate.try_consume(guild_id, user_id, cfg.cooldown()).await? {
            tracing::trace!(%guild_id, %user_id, "Still on XP cooldown");
            return Ok(None);
        }

        let delta = {
            let mut rng = rand::thread_rng();
            award::xp_for_message(cfg, &roles, &mut rng)
        };
        let outcome = match award::award(self.store.as_ref(), guild_id, user_id, delta).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.gate.release(guild_id, user_id).await;
                return Err(e);
            }
        };
        tracing::debug!(%guild_id, %user_id, "Awarded {}, total {}", outcome.awarded, outcome.new_total_xp);

        if outcome.leveled_up {
            tracing::info!(%guild_id, %user_id, "{} reached level {}", msg.username, outcome.new_level);
            let level_up = LevelUp {
                guild_id,
                user_id,
                username: &msg.username,
                channel_id,
                level: outcome.new_level,
            };
            reactor::on_level_up(
                self.platform.as_ref(),
                &level_up,
                &cfg.role_rewards,
                &cfg.level_up,
            )
            .await;
        }

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leveling::{
        cfg::{RoleReward, XpMultiplier, XpRange},
        cooldown::LocalCooldowns,
        fakes::{Call, MemStore, RecordingPlatform, UnreachableCooldowns},
        platform::NoticeTarget,
    };
    use std::time::Duration;

    const GUILD: GuildId = GuildId(1);
    const ALICE: UserId = UserId(10);
    const GENERAL: ChannelId = ChannelId(100);

    struct Harness {
        store: Arc<MemStore>,
        platform: Arc<RecordingPlatform>,
        leveling: Leveling,
    }

    fn harness(platform: RecordingPlatform) -> Harness {
        let store = Arc::new(MemStore::default());
        let platform = Arc::new(platform);
        let leveling = Leveling::new(
            store.clone(),
            Arc::new(LocalCooldowns::new()),
            platform.clone(),
        );
        Harness {
            store,
            platform,
            leveling,
        }
    }

    fn msg(roles: Option<Vec<RoleId>>) -> IncomingMessage {
        IncomingMessage {
            guild_id: GUILD,
            channel_id: GENERAL,
            user_id: ALICE,
            username: "alice".to_owned(),
            roles,
        }
    }

    fn fixed(xp: u32) -> LevelingCfg {
        LevelingCfg {
            xp_per_message: XpRange { min: xp, max: xp },
            ..LevelingCfg::default()
        }
    }

    /// Tests two messages inside one cooldown window, then one after it.
    ///
    /// Expected: first and third award, second is a no-op
    #[tokio::test(start_paused = true)]
    async fn cooldown_limits_awards() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        let cfg = fixed(20);

        assert!(h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await?.is_some());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await?.is_none());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await?.is_some());

        assert_eq!(h.store.row(GUILD, ALICE).unwrap().total_xp, Exp(40));
        Ok(())
    }

    /// Tests the silent no-op paths: disabled module, ignored channel, ignored role.
    #[tokio::test(start_paused = true)]
    async fn ignored_messages_earn_nothing() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        let disabled = LevelingCfg {
            enabled: false,
            ..fixed(20)
        };
        let ignoring_channel = LevelingCfg {
            ignored_channels: vec![GENERAL],
            ..fixed(20)
        };
        let ignoring_role = LevelingCfg {
            ignored_roles: vec![RoleId(66)],
            ..fixed(20)
        };

        assert!(h.leveling.handle_message(&disabled, &msg(Some(vec![]))).await?.is_none());
        assert!(h.leveling.handle_message(&ignoring_channel, &msg(Some(vec![]))).await?.is_none());
        assert!(h
            .leveling
            .handle_message(&ignoring_role, &msg(Some(vec![RoleId(66)])))
            .await?
            .is_none());

        assert!(h.store.row(GUILD, ALICE).is_none());
        // ignored messages must not consume the cooldown
        assert!(h.leveling.handle_message(&fixed(20), &msg(Some(vec![]))).await?.is_some());
        Ok(())
    }

    /// Tests a message event that lacks the author's roles.
    ///
    /// Expected: the roles are queried from the platform and the multiplier applies
    #[tokio::test(start_paused = true)]
    async fn queries_missing_roles() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::with_member_roles(&[RoleId(2)]));
        let cfg = LevelingCfg {
            xp_multipliers: vec![XpMultiplier {
                role_id: RoleId(2),
                multiplier: 3.0,
            }],
            ..fixed(10)
        };

        let outcome = h.leveling.handle_message(&cfg, &msg(None)).await?.unwrap();

        assert_eq!(outcome.awarded, Exp(30));
        assert_eq!(h.platform.calls(), vec![Call::MemberRoles]);
        Ok(())
    }

    /// Tests a level-up through the entry point.
    ///
    /// Member at total 99 earns 2 and has a level 1 reward.
    ///
    /// Expected: reward granted and exactly one notice
    #[tokio::test(start_paused = true)]
    async fn level_up_runs_reactor_once() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        h.store.seed(GUILD, ALICE, Exp(99), 0);
        let cfg = LevelingCfg {
            role_rewards: vec![RoleReward {
                level: 1,
                role_id: RoleId(11),
                remove_on_higher_level: false,
            }],
            ..fixed(2)
        };

        let outcome = h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await?.unwrap();

        assert!(outcome.leveled_up);
        assert_eq!(outcome.new_total_xp, Exp(101));
        assert_eq!(h.platform.notices(), 1);
        assert_eq!(
            h.platform.calls(),
            vec![
                Call::Grant(RoleId(11)),
                Call::Notify(
                    NoticeTarget::Channel(GENERAL),
                    "<@10> just reached level 1!".to_owned()
                ),
            ]
        );
        Ok(())
    }

    /// Tests a brand-new member whose first award is worth a level.
    ///
    /// Expected: no level-up, no reward, no notice
    #[tokio::test(start_paused = true)]
    async fn new_member_gets_no_reactor() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        let cfg = LevelingCfg {
            role_rewards: vec![RoleReward {
                level: 1,
                role_id: RoleId(11),
                remove_on_higher_level: false,
            }],
            ..fixed(150)
        };

        let outcome = h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await?.unwrap();

        assert!(!outcome.leveled_up);
        assert_eq!(outcome.new_level, 0);
        assert!(h.platform.calls().is_empty());
        Ok(())
    }

    /// Tests a storage failure after the gate admitted the message.
    ///
    /// Expected: error surfaced, no experience stored, cooldown slot handed back
    #[tokio::test(start_paused = true)]
    async fn failed_award_releases_cooldown() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        let cfg = fixed(20);
        h.store.fail_next_add();

        assert!(h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await.is_err());
        assert!(h.store.row(GUILD, ALICE).is_none());

        assert!(h.leveling.handle_message(&cfg, &msg(Some(vec![]))).await?.is_some());
        Ok(())
    }

    /// Tests the shown level right after a first award worth level 1.
    ///
    /// Expected: level 1, although the persisted level is still 0
    #[tokio::test(start_paused = true)]
    async fn current_level_includes_pending_level_up() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        h.leveling.handle_message(&fixed(150), &msg(Some(vec![]))).await?;

        let progress = h.leveling.progress(GUILD, ALICE).await?.unwrap();

        assert_eq!(progress.level, 0);
        assert_eq!(progress.current_level(), 1);
        Ok(())
    }

    /// Tests a cooldown cache that cannot be reached.
    ///
    /// Expected: the error surfaces, nothing is stored and no role call is made
    #[tokio::test]
    async fn unreachable_cooldowns_fail_closed() {
        let store = Arc::new(MemStore::default());
        let platform = Arc::new(RecordingPlatform::default());
        let leveling = Leveling::new(
            store.clone(),
            Arc::new(UnreachableCooldowns),
            platform.clone(),
        );

        let res = leveling.handle_message(&fixed(20), &msg(Some(vec![]))).await;

        assert!(matches!(res, Err(crate::error::Error::Sqlx(_))));
        assert!(store.row(GUILD, ALICE).is_none());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn progress_reads_store() -> crate::error::Result<()> {
        let h = harness(RecordingPlatform::default());
        assert_eq!(h.leveling.progress(GUILD, ALICE).await?, None);
        h.store.seed(GUILD, ALICE, Exp(400), 2);
        let progress = h.leveling.progress(GUILD, ALICE).await?.unwrap();
        assert_eq!((progress.total_xp, progress.level), (Exp(400), 2));
        Ok(())
    }
}
