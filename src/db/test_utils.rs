//! Access to a real Postgres for tests of the SQL in [`crate::db`].
//!
//! Tests using [`TestDb`] only run when `DATABASE_URL` points at a Postgres
//! database; without it they return early and pass.

use rand::Rng;
use serenity::model::prelude::GuildId;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};

use crate::immut_data::consts::SCHEMA;

pub(crate) struct TestDb {
    pub(crate) pool: PgPool,
    /// A guild no other test touches.
    pub(crate) guild_id: GuildId,
}

impl TestDb {
    /// Connects and creates the schema, or returns `None` without `DATABASE_URL`.
    pub(crate) async fn connect() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL is not set, skipping");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .expect("Failed to connect to DATABASE_URL");
        // concurrent `CREATE TABLE IF NOT EXISTS` can still collide
        let schema = format!("BEGIN; SELECT pg_advisory_xact_lock(7_471_001); {SCHEMA} COMMIT;");
        pool.execute(schema.as_str())
            .await
            .expect("Failed to initialize database");

        let guild_id = GuildId(rand::thread_rng().gen_range(1..i64::MAX as u64));
        Some(Self { pool, guild_id })
    }
}
