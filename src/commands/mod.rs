use std::collections::HashSet;

use serenity::{
    framework::standard::{
        help_commands,
        macros::{group, help},
        Args, CommandError, CommandGroup, CommandResult, HelpOptions,
    },
    model::prelude::{Message, UserId},
    prelude::{Context, TypeMapKey},
};

mod leaderboard;
mod levels;
mod ping;
mod rank;
mod stop;

use leaderboard::LEADERBOARD_COMMAND;
use levels::LEVELS_COMMAND;
use ping::PING_COMMAND;
use rank::RANK_COMMAND;
use stop::STOP_COMMAND;

#[group]
#[commands(ping, rank, leaderboard)]
pub(crate) struct General;

#[group]
#[only_in(guilds)]
#[required_permissions("MANAGE_GUILD")]
#[commands(levels)]
pub(crate) struct Admin;

#[group]
#[owners_only]
#[commands(stop)]
pub(crate) struct Owner;

#[help]
#[individual_command_tip = "Hi! I hand out experience for chatting and roles for leveling up.\n\n\
If you want more information about a specific command, just pass the command as argument."]
#[command_not_found_text = "Could not find: `{}`."]
#[max_levenshtein_distance(3)]
#[indention_prefix = "+"]
#[lacking_permissions = "Hide"]
#[lacking_role = "Hide"]
#[wrong_channel = "Strike"]
pub(crate) async fn my_help(
    context: &Context,
    msg: &Message,
    args: Args,
    help_options: &'static HelpOptions,
    groups: &[&'static CommandGroup],
    owners: HashSet<UserId>,
) -> CommandResult {
    let _ = help_commands::with_embeds(context, msg, args, help_options, groups, owners).await;
    Ok(())
}

/// Clones a value the startup code put into [`Context::data`].
async fn state<K>(ctx: &Context) -> Result<K::Value, CommandError>
where
    K: TypeMapKey,
    K::Value: Clone,
{
    let rlock = ctx.data.read().await;
    rlock
        .get::<K>()
        .cloned()
        .ok_or_else(|| CommandError::from("Bot state is missing from the typemap"))
}
