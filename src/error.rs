#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Cfg(#[from] CfgError),
}

/// Reasons a bot or guild configuration is rejected.
///
/// Configuration is validated once when it is loaded and again before it is saved,
/// so the award path never sees a value that violates these.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub(crate) enum CfgError {
    #[error("Malformed leveling config: {0}")]
    Malformed(String),
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),
    #[error("Unknown cooldown store `{0}`, expected `postgres` or `memory`")]
    UnknownCooldownStore(String),
    #[error("XP range is empty: min {min} is greater than max {max}")]
    XpRange { min: u32, max: u32 },
    #[error("XP cooldown must be at least one second")]
    ZeroCooldown,
    #[error("XP multiplier must be a positive finite number, got {0}")]
    Multiplier(f64),
    #[error("XP multiplier must be at most 100, got {0}")]
    MultiplierTooLarge(f64),
    #[error("Role {role_id} is rewarded twice at level {level}")]
    DuplicateReward { level: u32, role_id: u64 },
}

pub(crate) type Result<T> = core::result::Result<T, Error>;
