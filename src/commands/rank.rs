use serenity::{
    framework::standard::{macros::command, Args, CommandResult},
    model::prelude::{Message, UserId},
    prelude::Context,
    utils::MessageBuilder,
};

use super::state;
use crate::{
    app_state::{
        exp::Exp,
        type_map_keys::{LevelingKey, PgPoolKey},
    },
    db,
    leveling::MemberProgress,
    util::say_wo_unintended_mentions,
};

#[command]
#[only_in(guilds)]
#[aliases("level", "xp")]
#[usage = "[@member]"]
#[description = "Show the level and experience of a member, yourself by default."]
async fn rank(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let user_id: UserId = if args.is_empty() {
        msg.author.id
    } else {
        match args.single::<UserId>() {
            Ok(user_id) => user_id,
            Err(_) => {
                msg.reply(ctx, "Mention a member, or pass nothing to see your own rank.")
                    .await?;
                return Ok(());
            }
        }
    };

    let leveling = state::<LevelingKey>(ctx).await?;
    let Some(progress) = leveling.progress(guild_id, user_id).await? else {
        let response = MessageBuilder::new()
            .mention(&user_id)
            .push(" hasn't earned any experience yet.")
            .build();
        say_wo_unintended_mentions(msg.channel_id, &ctx.http, None, response).await?;
        return Ok(());
    };

    let pool = state::<PgPoolKey>(ctx).await?;
    let position = db::rank_position(&pool, guild_id, progress.total_xp.to_i64()).await?;
    let response = describe_rank(&progress, position);
    say_wo_unintended_mentions(msg.channel_id, &ctx.http, None, response).await?;
    Ok(())
}

fn describe_rank(progress: &MemberProgress, position: i64) -> String {
    let level = progress.current_level();
    let next = Exp::for_level(level.saturating_add(1));
    let remaining = Exp(next.0.saturating_sub(progress.total_xp.0));

    MessageBuilder::new()
        .mention(&progress.user_id)
        .push(format!(" is level **{level}**"))
        .push(format!(" with {} (rank #{position}).\n", progress.total_xp))
        .push(format!("{remaining} to go until level {}.", level.saturating_add(1)))
        .build()
}
