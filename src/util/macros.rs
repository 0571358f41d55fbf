/// Converts a serenity id (`GuildId`, `UserId`, `RoleId`, ...) into the `BIGINT`
/// representation used by the database.
macro_rules! i64_from_id {
    ($id:expr) => {{
        #[allow(clippy::cast_possible_wrap)]
        let id: i64 = ::core::convert::identity::<u64>($id.0) as i64;
        id
    }};
}

/// Inverse of [`i64_from_id`].
macro_rules! u64_from_i64 {
    ($value:expr) => {{
        debug_assert!($value >= 0);
        #[allow(clippy::cast_sign_loss)]
        let value: u64 = ::core::convert::identity::<i64>($value) as u64;
        value
    }};
}

// Exporting the macro
// https://stackoverflow.com/questions/26731243/how-do-i-use-a-macro-across-module-files/67140319#67140319
pub(crate) use i64_from_id;
pub(crate) use u64_from_i64;
