use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serenity::model::prelude::{ChannelId, Mentionable, RoleId, UserId};
use std::time::Duration;

use crate::{app_state::exp::Exp, error::CfgError};

/// Largest accepted XP multiplier.
pub(crate) const MAX_XP_MULTIPLIER: f64 = 100.0;

pub(crate) const DEFAULT_LEVEL_UP_TEMPLATE: &str = "{user} just reached level {level}!";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(user|username|level)\}").unwrap());

/// Per-guild leveling configuration.
///
/// Stored as JSON; every field may be omitted and then takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LevelingCfg {
    pub(crate) enabled: bool,
    pub(crate) xp_per_message: XpRange,
    /// Seconds between two XP-eligible messages of the same member.
    pub(crate) xp_cooldown: u64,
    pub(crate) role_rewards: Vec<RoleReward>,
    /// Checked in order; the first role the member holds wins.
    pub(crate) xp_multipliers: Vec<XpMultiplier>,
    pub(crate) ignored_channels: Vec<ChannelId>,
    pub(crate) ignored_roles: Vec<RoleId>,
    pub(crate) level_up: LevelUpNotice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct XpRange {
    pub(crate) min: u32,
    pub(crate) max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RoleReward {
    pub(crate) level: u32,
    pub(crate) role_id: RoleId,
    #[serde(default)]
    pub(crate) remove_on_higher_level: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct XpMultiplier {
    pub(crate) role_id: RoleId,
    pub(crate) multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LevelUpNotice {
    pub(crate) destination: NoticeDestination,
    pub(crate) template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum NoticeDestination {
    /// The channel the triggering message was sent in.
    Current,
    Channel { channel_id: ChannelId },
    DirectMessage,
    Off,
}

impl Default for LevelingCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            xp_per_message: XpRange::default(),
            xp_cooldown: 60,
            role_rewards: Vec::new(),
            xp_multipliers: Vec::new(),
            ignored_channels: Vec::new(),
            ignored_roles: Vec::new(),
            level_up: LevelUpNotice::default(),
        }
    }
}

impl Default for XpRange {
    fn default() -> Self {
        Self { min: 15, max: 25 }
    }
}

impl Default for LevelUpNotice {
    fn default() -> Self {
        Self {
            destination: NoticeDestination::Current,
            template: DEFAULT_LEVEL_UP_TEMPLATE.to_owned(),
        }
    }
}

impl LevelingCfg {
    /// Parses and validates a stored configuration.
    pub(crate) fn from_json(json: &str) -> crate::error::Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| CfgError::Malformed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub(crate) fn to_json(&self) -> crate::error::Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    pub(crate) fn validate(&self) -> Result<(), CfgError> {
        let XpRange { min, max } = self.xp_per_message;
        if min > max {
            return Err(CfgError::XpRange { min, max });
        }
        if self.xp_cooldown == 0 {
            return Err(CfgError::ZeroCooldown);
        }
        if let Some(bad) = self
            .xp_multipliers
            .iter()
            .find(|m| !m.multiplier.is_finite() || m.multiplier <= 0.0)
        {
            return Err(CfgError::Multiplier(bad.multiplier));
        }
        if let Some(huge) = self
            .xp_multipliers
            .iter()
            .find(|m| m.multiplier > MAX_XP_MULTIPLIER)
        {
            return Err(CfgError::MultiplierTooLarge(huge.multiplier));
        }
        for (i, reward) in self.role_rewards.iter().enumerate() {
            let duplicated = self.role_rewards[..i]
                .iter()
                .any(|r| r.level == reward.level && r.role_id == reward.role_id);
            if duplicated {
                return Err(CfgError::DuplicateReward {
                    level: reward.level,
                    role_id: reward.role_id.0,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn cooldown(&self) -> Duration {
        Duration::from_secs(self.xp_cooldown)
    }

    /// Whether messages in `channel_id` by a member holding `roles` earn nothing.
    pub(crate) fn ignores(&self, channel_id: ChannelId, roles: &[RoleId]) -> bool {
        self.ignored_channels.contains(&channel_id)
            || roles.iter().any(|r| self.ignored_roles.contains(r))
    }

    /// The multiplier of the first configured role the member holds.
    pub(crate) fn multiplier_for(&self, roles: &[RoleId]) -> Option<f64> {
        self.xp_multipliers
            .iter()
            .find(|m| roles.contains(&m.role_id))
            .map(|m| m.multiplier)
    }
}

impl XpRange {
    /// Uniform draw from `[min, max]`, both inclusive.
    pub(crate) fn draw(self, rng: &mut impl Rng) -> Exp {
        Exp(u64::from(rng.gen_range(self.min..=self.max)))
    }
}

impl LevelUpNotice {
    pub(crate) fn render(&self, user_id: UserId, username: &str, level: u32) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| match &caps[1] {
                "user" => user_id.mention().to_string(),
                "username" => username.to_owned(),
                _ => level.to_string(),
            })
            .into_owned()
    }
}
