use core::convert::identity as id;

/// Experience points. Always non-negative; stored as `BIGINT` in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) struct Exp(pub(crate) u64);

impl Exp {
    /// The most experience a `BIGINT` column holds.
    #[allow(clippy::cast_sign_loss)]
    pub(crate) const MAX: Exp = Exp(i64::MAX as u64);

    /// Saturates at `i64::MAX`, so the result is never negative.
    pub(crate) fn to_i64(self) -> i64 {
        let Exp(exp) = self;
        i64::try_from(exp).unwrap_or(i64::MAX)
    }

    pub(crate) fn from_i64(exp: i64) -> Self {
        debug_assert!(exp >= 0);
        #[allow(clippy::cast_sign_loss)]
        let exp: u64 = id::<i64>(exp) as u64;
        Exp(exp)
    }

    /// The level reached with this much total experience,
    /// `floor(0.1 * sqrt(exp))`.
    ///
    /// Computed as `isqrt(exp) / 10`, which is equal for every integer input
    /// and avoids float rounding near perfect squares.
    pub(crate) fn level(self) -> u32 {
        let Exp(exp) = self;
        let level = isqrt(exp) / 10;
        u32::try_from(level).unwrap_or(u32::MAX)
    }

    /// Smallest total experience that reaches `level`.
    pub(crate) fn for_level(level: u32) -> Self {
        let root = u64::from(level) * 10;
        Exp(root.saturating_mul(root))
    }

    /// Applies a multiplier, flooring the result and capping it at [`Exp::MAX`].
    pub(crate) fn scaled(self, multiplier: f64) -> Self {
        let Exp(exp) = self;
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let scaled = (exp as f64 * multiplier).floor() as u64;
        Exp(scaled.min(Self::MAX.0))
    }
}

impl core::fmt::Display for Exp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} XP", self.0)
    }
}

fn isqrt(n: u64) -> u64 {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let mut root = (n as f64).sqrt() as u64;
    // the float estimate can be off by one in either direction for large n
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).map_or(false, |sq| sq <= n) {
        root += 1;
    }
    root
}
