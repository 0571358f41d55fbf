//! A Discord bot that hands out experience for chatting, tracks levels and
//! grants roles as members level up.

use anyhow::Context as _;
use serenity::{framework::StandardFramework, prelude::Client};
use shuttle_secrets::SecretStore;
use sqlx::PgPool;
use std::sync::Arc;

mod app_state;
mod bots;
mod commands;
mod db;
mod error;
mod immut_data;
mod leveling;
mod util;

use app_state::{
    type_map_keys::{BotCfgKey, GuildCfgsKey, LevelingKey, PgPoolKey, ShardManagerKey},
    GuildCfgs,
};
use bots::{Bot, CfgExt};
use commands::{ADMIN_GROUP, GENERAL_GROUP, MY_HELP, OWNER_GROUP};
use immut_data::consts::DISCORD_INTENTS;

#[shuttle_runtime::main]
async fn serenity(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_secrets::Secrets] secret_store: SecretStore,
) -> shuttle_serenity::ShuttleSerenity {
    let bot = Bot::new(pool.clone(), &secret_store).await?;
    let cfg = bot.cfg();
    let token = bot.discord_token().to_owned();

    let framework = StandardFramework::new()
        .configure(|c| {
            c.prefix(cfg.discord_prefix.as_str())
                .owners(cfg.owners.clone())
        })
        .help(&MY_HELP)
        .group(&GENERAL_GROUP)
        .group(&ADMIN_GROUP)
        .group(&OWNER_GROUP);

    let client = Client::builder(&token, DISCORD_INTENTS)
        .framework(framework)
        .event_handler(bot)
        .await
        .context("Failed to create the Discord client")?;

    {
        let leveling = Bot::leveling(&pool, &cfg, client.cache_and_http.http.clone());
        let mut wlock = client.data.write().await;
        wlock.insert::<ShardManagerKey>(client.shard_manager.clone());
        wlock.insert::<PgPoolKey>(pool);
        wlock.insert::<BotCfgKey>(cfg);
        wlock.insert::<LevelingKey>(Arc::new(leveling));
        wlock.insert::<GuildCfgsKey>(Arc::new(GuildCfgs::new()));
    }

    Ok(client.into())
}
