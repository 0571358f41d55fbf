use serenity::{
    http::Http,
    model::prelude::{ChannelId, Message, UserId},
};

pub(crate) mod macros;

/// Sends `content` to `chan` so that only `allowed_mention` (if any) gets pinged.
///
/// Mentions of anyone else in `content` still render, they just don't notify.
pub(crate) async fn say_wo_unintended_mentions(
    chan: ChannelId,
    http: impl AsRef<Http>,
    allowed_mention: Option<UserId>,
    content: impl std::fmt::Display,
) -> serenity::Result<Message> {
    chan.send_message(http, |m| {
        m.content(content).allowed_mentions(|am| {
            am.empty_parse();
            if let Some(user_id) = allowed_mention {
                am.users([user_id]);
            }
            am
        })
    })
    .await
}
