//! In-memory stand-ins for the leveling collaborators.

use serenity::{
    async_trait,
    model::prelude::{GuildId, RoleId, UserId},
};
use std::{
    collections::HashMap,
    time::Duration,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use super::{
    cooldown::{CooldownCache, CooldownKey},
    platform::{NoticeTarget, Platform},
    store::{AddedXp, ProgressStore},
    MemberProgress,
};
use crate::{app_state::exp::Exp, error::Error};

fn unavailable() -> Error {
    Error::Sqlx(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
pub(crate) struct MemStore {
    rows: Mutex<HashMap<(GuildId, UserId), MemberProgress>>,
    fail_next_add: AtomicBool,
}

impl MemStore {
    pub(crate) fn seed(&self, guild_id: GuildId, user_id: UserId, total_xp: Exp, level: u32) {
        self.rows.lock().unwrap().insert(
            (guild_id, user_id),
            MemberProgress {
                guild_id,
                user_id,
                xp: total_xp,
                level,
                total_xp,
                last_xp_gain_at: 0,
            },
        );
    }

    pub(crate) fn row(&self, guild_id: GuildId, user_id: UserId) -> Option<MemberProgress> {
        self.rows.lock().unwrap().get(&(guild_id, user_id)).cloned()
    }

    pub(crate) fn fail_next_add(&self) {
        self.fail_next_add.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressStore for MemStore {
    async fn member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> crate::error::Result<Option<MemberProgress>> {
        Ok(self.row(guild_id, user_id))
    }

    async fn add_xp(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        delta: Exp,
    ) -> crate::error::Result<AddedXp> {
        if self.fail_next_add.swap(false, Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut rows = self.rows.lock().unwrap();
        let mut created = false;
        let row = rows.entry((guild_id, user_id)).or_insert_with(|| {
            created = true;
            MemberProgress {
                guild_id,
                user_id,
                xp: Exp(0),
                level: 0,
                total_xp: Exp(0),
                last_xp_gain_at: 0,
            }
        });
        row.xp = Exp(row.xp.0 + delta.0);
        row.total_xp = Exp(row.total_xp.0 + delta.0);
        Ok(AddedXp {
            xp: row.xp,
            total_xp: row.total_xp,
            level: row.level,
            created,
        })
    }

    async fn raise_level(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        level: u32,
    ) -> crate::error::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&(guild_id, user_id)) {
            Some(row) if row.level < level => {
                row.level = level;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// A cooldown cache that is never reachable.
pub(crate) struct UnreachableCooldowns;

#[async_trait]
impl CooldownCache for UnreachableCooldowns {
    async fn set_if_absent(&self, _key: CooldownKey, _ttl: Duration) -> crate::error::Result<bool> {
        Err(unavailable())
    }

    async fn release(&self, _key: CooldownKey) -> crate::error::Result<()> {
        Err(unavailable())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    MemberRoles,
    Grant(RoleId),
    Revoke(RoleId),
    Notify(NoticeTarget, String),
}

/// Records every call; role calls on `failing` roles return an error, and so
/// does every notice when `failing_notices` is set.
#[derive(Default)]
pub(crate) struct RecordingPlatform {
    pub(crate) member_roles: Vec<RoleId>,
    failing: Vec<RoleId>,
    failing_notices: bool,
    calls: Mutex<Vec<Call>>,
    notices: AtomicUsize,
}

impl RecordingPlatform {
    pub(crate) fn failing_on(roles: &[RoleId]) -> Self {
        Self {
            failing: roles.to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn failing_notices() -> Self {
        Self {
            failing_notices: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_member_roles(roles: &[RoleId]) -> Self {
        Self {
            member_roles: roles.to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn notices(&self) -> usize {
        self.notices.load(Ordering::SeqCst)
    }

    fn role_call(&self, call: Call, role_id: RoleId) -> crate::error::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(&role_id) {
            return Err(Error::Serenity(serenity::Error::Other("Missing Permissions")));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn member_roles(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
    ) -> crate::error::Result<Vec<RoleId>> {
        self.calls.lock().unwrap().push(Call::MemberRoles);
        Ok(self.member_roles.clone())
    }

    async fn grant_role(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
        role_id: RoleId,
    ) -> crate::error::Result<()> {
        self.role_call(Call::Grant(role_id), role_id)
    }

    async fn revoke_role(
        &self,
        _guild_id: GuildId,
        _user_id: UserId,
        role_id: RoleId,
    ) -> crate::error::Result<()> {
        self.role_call(Call::Revoke(role_id), role_id)
    }

    async fn notify(
        &self,
        target: NoticeTarget,
        _member: UserId,
        content: &str,
    ) -> crate::error::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Notify(target, content.to_owned()));
        if self.failing_notices {
            return Err(Error::Serenity(serenity::Error::Other("Cannot send messages to this user")));
        }
        self.notices.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
