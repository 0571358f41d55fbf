use itertools::Itertools;
use serenity::{
    framework::standard::{macros::command, Args, CommandResult},
    model::prelude::{Mentionable, Message, UserId},
    prelude::Context,
};

use super::state;
use crate::{
    app_state::{exp::Exp, type_map_keys::PgPoolKey},
    db,
    immut_data::consts::{LEADERBOARD_DEFAULT_LEN, LEADERBOARD_MAX_LEN},
    util::{macros::u64_from_i64, say_wo_unintended_mentions},
};

#[command]
#[only_in(guilds)]
#[aliases("top")]
#[usage = "[how many]"]
#[description = "List the members with the most experience."]
async fn leaderboard(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let len = args
        .single::<i64>()
        .unwrap_or(LEADERBOARD_DEFAULT_LEN)
        .clamp(1, LEADERBOARD_MAX_LEN);

    let pool = state::<PgPoolKey>(ctx).await?;
    let entries = db::leaderboard(&pool, guild_id, len).await?;
    if entries.is_empty() {
        msg.reply(ctx, "Nobody has earned any experience here yet.")
            .await?;
        return Ok(());
    }

    let lines = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let user_id = UserId(u64_from_i64!(entry.user_id));
            format!(
                "{}. {} level {} ({})",
                i + 1,
                user_id.mention(),
                entry.level,
                Exp::from_i64(entry.total_xp)
            )
        })
        .join("\n");
    say_wo_unintended_mentions(
        msg.channel_id,
        &ctx.http,
        None,
        format!("**Leaderboard**\n{lines}"),
    )
    .await?;
    Ok(())
}
