use itertools::Itertools;
use serenity::{
    framework::standard::{macros::command, Args, CommandResult},
    model::prelude::{ChannelId, Mentionable, Message, RoleId},
    prelude::Context,
    utils::{parse_channel, parse_role},
};

use super::state;
use crate::{
    app_state::type_map_keys::{BotCfgKey, GuildCfgsKey, PgPoolKey},
    error::Error,
    leveling::cfg::{
        LevelingCfg, NoticeDestination, RoleReward, XpMultiplier, XpRange,
        DEFAULT_LEVEL_UP_TEMPLATE,
    },
    util::say_wo_unintended_mentions,
};

#[command]
#[only_in(guilds)]
#[required_permissions("MANAGE_GUILD")]
#[description = "Configure experience and level rewards for this server."]
#[sub_commands(
    show,
    enable,
    disable,
    xp,
    cooldown,
    reward,
    unreward,
    multiplier,
    unmultiplier,
    ignore,
    unignore,
    notify
)]
async fn levels(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let prefix = state::<BotCfgKey>(ctx).await?.discord_prefix;
    let sub_commands = LEVELS_COMMAND_OPTIONS
        .sub_commands
        .iter()
        .filter_map(|sub| sub.options.names.first())
        .map(|name| format!("`{prefix}levels {name}`"))
        .join(", ");
    let response = match args.current() {
        Some(unknown) => format!(
            "Unknown subcommand `{}`. Try one of: {sub_commands}",
            unknown.replace('`', "")
        ),
        None => format!("Try one of the following subcommands: {sub_commands}"),
    };
    msg.reply(ctx, response).await?;
    Ok(())
}

#[command]
#[description = "Show the leveling configuration of this server."]
async fn show(ctx: &Context, msg: &Message) -> CommandResult {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let pool = state::<PgPoolKey>(ctx).await?;
    let guild_cfgs = state::<GuildCfgsKey>(ctx).await?;
    let response = match guild_cfgs.get_or_load(&pool, guild_id).await {
        Ok(Some(cfg)) => describe(&cfg),
        Ok(None) => "Leveling has not been set up here yet. Start with `levels enable`.".to_owned(),
        Err(Error::Cfg(e)) => format!(
            "The stored configuration is unusable ({e}). Any change will replace it with the defaults."
        ),
        Err(e) => return Err(e.into()),
    };
    say_wo_unintended_mentions(msg.channel_id, &ctx.http, None, response).await?;
    Ok(())
}

#[command]
#[description = "Start handing out experience in this server."]
async fn enable(ctx: &Context, msg: &Message) -> CommandResult {
    update_cfg(ctx, msg, |cfg| {
        cfg.enabled = true;
        Ok("Leveling is now enabled.".to_owned())
    })
    .await
}

#[command]
#[description = "Stop handing out experience. Progress is kept."]
async fn disable(ctx: &Context, msg: &Message) -> CommandResult {
    update_cfg(ctx, msg, |cfg| {
        cfg.enabled = false;
        Ok("Leveling is now disabled. Everyone keeps their progress.".to_owned())
    })
    .await
}

#[command]
#[num_args(2)]
#[usage = "<min> <max>"]
#[example = "15 25"]
#[description = "Set the range of experience a single message earns."]
async fn xp(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let (Ok(min), Ok(max)) = (args.single::<u32>(), args.single::<u32>()) else {
        msg.reply(ctx, "Expected two whole numbers, like `15 25`.")
            .await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        cfg.xp_per_message = XpRange { min, max };
        Ok(format!("Messages now earn between {min} and {max} XP."))
    })
    .await
}

#[command]
#[num_args(1)]
#[usage = "<seconds>"]
#[example = "60"]
#[description = "Set how long a member waits between two messages that earn experience."]
async fn cooldown(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Ok(seconds) = args.single::<u64>() else {
        msg.reply(ctx, "Expected the cooldown in whole seconds.")
            .await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        cfg.xp_cooldown = seconds;
        Ok(format!("Members now earn experience at most once every {seconds}s."))
    })
    .await
}

#[command]
#[min_args(2)]
#[max_args(3)]
#[usage = "<level> <@role> [replace]"]
#[example = "5 @Regular replace"]
#[description = "Grant a role when a member reaches a level. \
With `replace`, the role is taken away again once the member reaches the next reward level."]
async fn reward(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let (Ok(level), Ok(role_id)) = (args.single::<u32>(), args.single::<RoleId>()) else {
        msg.reply(ctx, "Expected a level and a role, like `5 @Regular`.")
            .await?;
        return Ok(());
    };
    let remove_on_higher_level = match args.single::<String>() {
        Err(_) => false,
        Ok(flag) if flag.eq_ignore_ascii_case("replace") => true,
        Ok(flag) => {
            msg.reply(ctx, format!("Unknown option `{flag}`, did you mean `replace`?"))
                .await?;
            return Ok(());
        }
    };
    update_cfg(ctx, msg, move |cfg| {
        if let Some(existing) = cfg
            .role_rewards
            .iter_mut()
            .find(|r| r.level == level && r.role_id == role_id)
        {
            existing.remove_on_higher_level = remove_on_higher_level;
        } else {
            cfg.role_rewards.push(RoleReward {
                level,
                role_id,
                remove_on_higher_level,
            });
            cfg.role_rewards.sort_by_key(|r| r.level);
        }
        Ok(format!("{} is now granted at level {level}.", role_id.mention()))
    })
    .await
}

#[command]
#[num_args(2)]
#[usage = "<level> <@role>"]
#[description = "Stop granting a role at a level. Members keep the role if they have it."]
async fn unreward(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let (Ok(level), Ok(role_id)) = (args.single::<u32>(), args.single::<RoleId>()) else {
        msg.reply(ctx, "Expected a level and a role, like `5 @Regular`.")
            .await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        let before = cfg.role_rewards.len();
        cfg.role_rewards
            .retain(|r| !(r.level == level && r.role_id == role_id));
        if cfg.role_rewards.len() == before {
            return Err(format!("{} is not a reward for level {level}.", role_id.mention()));
        }
        Ok(format!("{} is no longer granted at level {level}.", role_id.mention()))
    })
    .await
}

#[command]
#[num_args(2)]
#[usage = "<@role> <factor>"]
#[example = "@Booster 1.5"]
#[description = "Multiply the experience of members with a role. \
When a member holds several such roles, the one configured first applies. \
Factors go up to 100."]
async fn multiplier(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let (Ok(role_id), Ok(factor)) = (args.single::<RoleId>(), args.single::<f64>()) else {
        msg.reply(ctx, "Expected a role and a number, like `@Booster 1.5`.")
            .await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        match cfg.xp_multipliers.iter_mut().find(|m| m.role_id == role_id) {
            Some(existing) => existing.multiplier = factor,
            None => cfg.xp_multipliers.push(XpMultiplier {
                role_id,
                multiplier: factor,
            }),
        }
        Ok(format!("{} now earns {factor}x experience.", role_id.mention()))
    })
    .await
}

#[command]
#[num_args(1)]
#[usage = "<@role>"]
#[description = "Remove the experience multiplier of a role."]
async fn unmultiplier(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Ok(role_id) = args.single::<RoleId>() else {
        msg.reply(ctx, "Expected a role.").await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        let before = cfg.xp_multipliers.len();
        cfg.xp_multipliers.retain(|m| m.role_id != role_id);
        if cfg.xp_multipliers.len() == before {
            return Err(format!("{} has no multiplier.", role_id.mention()));
        }
        Ok(format!("{} earns regular experience again.", role_id.mention()))
    })
    .await
}

/// A channel or a role, as written in a mention.
#[derive(Clone, Copy)]
enum Ignorable {
    Channel(ChannelId),
    Role(RoleId),
}

impl Ignorable {
    fn parse(arg: &str) -> Option<Self> {
        parse_channel(arg)
            .map(|id| Self::Channel(ChannelId(id)))
            .or_else(|| parse_role(arg).map(|id| Self::Role(RoleId(id))))
    }

    fn mention(&self) -> String {
        match self {
            Self::Channel(id) => id.mention().to_string(),
            Self::Role(id) => id.mention().to_string(),
        }
    }
}

#[command]
#[num_args(1)]
#[usage = "<#channel|@role>"]
#[description = "Earn no experience in a channel, or for members with a role."]
async fn ignore(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Some(target) = args.single::<String>().ok().as_deref().and_then(Ignorable::parse) else {
        msg.reply(ctx, "Expected a channel or a role mention.")
            .await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        let added = match target {
            Ignorable::Channel(id) if !cfg.ignored_channels.contains(&id) => {
                cfg.ignored_channels.push(id);
                true
            }
            Ignorable::Role(id) if !cfg.ignored_roles.contains(&id) => {
                cfg.ignored_roles.push(id);
                true
            }
            _ => false,
        };
        if !added {
            return Err(format!("{} is already ignored.", target.mention()));
        }
        Ok(format!("{} no longer earns experience.", target.mention()))
    })
    .await
}

#[command]
#[num_args(1)]
#[usage = "<#channel|@role>"]
#[description = "Earn experience again in a channel, or for members with a role."]
async fn unignore(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Some(target) = args.single::<String>().ok().as_deref().and_then(Ignorable::parse) else {
        msg.reply(ctx, "Expected a channel or a role mention.")
            .await?;
        return Ok(());
    };
    update_cfg(ctx, msg, move |cfg| {
        let removed = match target {
            Ignorable::Channel(id) => remove_item(&mut cfg.ignored_channels, &id),
            Ignorable::Role(id) => remove_item(&mut cfg.ignored_roles, &id),
        };
        if !removed {
            return Err(format!("{} is not ignored.", target.mention()));
        }
        Ok(format!("{} earns experience again.", target.mention()))
    })
    .await
}

#[command]
#[min_args(1)]
#[usage = "<here|dm|off|#channel> [template]"]
#[example = "#level-ups GG {user}, you are now level {level}!"]
#[description = "Choose where level-ups are announced. \
The template may use `{user}`, `{username}` and `{level}`; `default` restores the built-in one."]
async fn notify(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Ok(where_to) = args.single::<String>() else {
        return Ok(());
    };
    let destination = match where_to.to_ascii_lowercase().as_str() {
        "here" => NoticeDestination::Current,
        "dm" => NoticeDestination::DirectMessage,
        "off" => NoticeDestination::Off,
        other => match parse_channel(other) {
            Some(id) => NoticeDestination::Channel {
                channel_id: ChannelId(id),
            },
            None => {
                msg.reply(ctx, "Expected `here`, `dm`, `off` or a channel mention.")
                    .await?;
                return Ok(());
            }
        },
    };
    let template = match args.rest().trim() {
        "" => None,
        "default" => Some(DEFAULT_LEVEL_UP_TEMPLATE.to_owned()),
        template => Some(template.to_owned()),
    };
    update_cfg(ctx, msg, move |cfg| {
        cfg.level_up.destination = destination;
        if let Some(template) = template {
            cfg.level_up.template = template;
        }
        Ok(format!(
            "Level-ups are now announced {}.",
            describe_destination(destination)
        ))
    })
    .await
}

/// Applies `edit` to the guild's configuration and saves the result.
///
/// `edit` returns the confirmation for the invoker, or an explanation of why
/// nothing changed. A guild without a stored configuration, or with one that no
/// longer loads, starts from the defaults.
async fn update_cfg(
    ctx: &Context,
    msg: &Message,
    edit: impl FnOnce(&mut LevelingCfg) -> Result<String, String> + Send,
) -> CommandResult {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let pool = state::<PgPoolKey>(ctx).await?;
    let guild_cfgs = state::<GuildCfgsKey>(ctx).await?;

    let mut cfg = match guild_cfgs.get_or_load(&pool, guild_id).await {
        Ok(Some(cfg)) => LevelingCfg::clone(&cfg),
        Ok(None) => LevelingCfg::default(),
        Err(Error::Cfg(e)) => {
            tracing::warn!(%guild_id, "Replacing an unusable leveling configuration: {e}");
            LevelingCfg::default()
        }
        Err(e) => return Err(e.into()),
    };

    let response = match edit(&mut cfg) {
        Ok(confirmation) => match guild_cfgs.save(&pool, guild_id, cfg).await {
            Ok(_) => confirmation,
            Err(Error::Cfg(e)) => format!("Nothing changed: {e}."),
            Err(e) => return Err(e.into()),
        },
        Err(reason) => reason,
    };
    say_wo_unintended_mentions(msg.channel_id, &ctx.http, None, response).await?;
    Ok(())
}

fn remove_item<T: PartialEq>(items: &mut Vec<T>, item: &T) -> bool {
    let before = items.len();
    items.retain(|i| i != item);
    items.len() != before
}

fn describe_destination(destination: NoticeDestination) -> String {
    match destination {
        NoticeDestination::Current => "in the channel of the message".to_owned(),
        NoticeDestination::Channel { channel_id } => format!("in {}", channel_id.mention()),
        NoticeDestination::DirectMessage => "in a direct message".to_owned(),
        NoticeDestination::Off => "nowhere".to_owned(),
    }
}

fn describe(cfg: &LevelingCfg) -> String {
    let XpRange { min, max } = cfg.xp_per_message;
    let mut lines = vec![
        format!(
            "Leveling is **{}**.",
            if cfg.enabled { "enabled" } else { "disabled" }
        ),
        format!(
            "Each message earns {min} to {max} XP, at most once every {}s.",
            cfg.xp_cooldown
        ),
    ];
    if !cfg.role_rewards.is_empty() {
        let rewards = cfg
            .role_rewards
            .iter()
            .map(|r| {
                let replaced = if r.remove_on_higher_level {
                    " (replaced)"
                } else {
                    ""
                };
                format!("level {} {}{replaced}", r.level, r.role_id.mention())
            })
            .join(", ");
        lines.push(format!("Rewards: {rewards}"));
    }
    if !cfg.xp_multipliers.is_empty() {
        let multipliers = cfg
            .xp_multipliers
            .iter()
            .map(|m| format!("{} {}x", m.role_id.mention(), m.multiplier))
            .join(", ");
        lines.push(format!("Multipliers: {multipliers}"));
    }
    let ignored = cfg
        .ignored_channels
        .iter()
        .map(|c| c.mention().to_string())
        .chain(cfg.ignored_roles.iter().map(|r| r.mention().to_string()))
        .join(", ");
    if !ignored.is_empty() {
        lines.push(format!("Ignored: {ignored}"));
    }
    lines.push(format!(
        "Level-ups are announced {}: \"{}\"",
        describe_destination(cfg.level_up.destination),
        cfg.level_up.template
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ignorable_mentions() {
        assert!(matches!(
            Ignorable::parse("<#10>"),
            Some(Ignorable::Channel(ChannelId(10)))
        ));
        assert!(matches!(
            Ignorable::parse("<@&20>"),
            Some(Ignorable::Role(RoleId(20)))
        ));
        assert!(Ignorable::parse("<@30>").is_none());
        assert!(Ignorable::parse("general").is_none());
    }

    #[test]
    fn removes_every_copy() {
        let mut items = vec![1, 2, 1];
        assert!(remove_item(&mut items, &1));
        assert_eq!(items, [2]);
        assert!(!remove_item(&mut items, &1));
    }

    /// Tests the summary of a default configuration.
    ///
    /// Expected: no reward, multiplier or ignore lines
    #[test]
    fn describes_default_cfg() {
        let described = describe(&LevelingCfg::default());
        assert_eq!(
            described,
            "Leveling is **enabled**.\n\
             Each message earns 15 to 25 XP, at most once every 60s.\n\
             Level-ups are announced in the channel of the message: \"{user} just reached level {level}!\""
        );
    }

    #[test]
    fn describes_rewards_and_ignores() {
        let cfg = LevelingCfg {
            role_rewards: vec![RoleReward {
                level: 5,
                role_id: RoleId(7),
                remove_on_higher_level: true,
            }],
            ignored_channels: vec![ChannelId(3)],
            ignored_roles: vec![RoleId(4)],
            ..LevelingCfg::default()
        };
        let described = describe(&cfg);
        assert!(described.contains("Rewards: level 5 <@&7> (replaced)"));
        assert!(described.contains("Ignored: <#3>, <@&4>"));
    }
}
