use serenity::prelude::GatewayIntents;

pub(crate) const SCHEMA: &str = include_str!("../../schema.pgsql");

pub(crate) const DISCORD_INTENTS: GatewayIntents = {
    let guilds = GatewayIntents::GUILDS.bits();
    let messages = GatewayIntents::GUILD_MESSAGES.bits();
    let content = GatewayIntents::MESSAGE_CONTENT.bits();
    match GatewayIntents::from_bits(guilds | messages | content) {
        Some(intents) => intents,
        None => panic!("Invalid intents"),
    }
};

pub(crate) const DEFAULT_PREFIX: &str = "!";

pub(crate) const LEADERBOARD_DEFAULT_LEN: i64 = 10;
pub(crate) const LEADERBOARD_MAX_LEN: i64 = 25;
