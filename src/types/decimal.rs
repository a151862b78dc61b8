//! Fixed-point decimal extension values.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EvalError;

const SCALE: i128 = 10_000;
const FRACTION_DIGITS: usize = 4;

static DECIMAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?)([0-9]{1,15})\.([0-9]{1,4})$").expect("decimal pattern is a valid regex")
});

/// A decimal with exactly four fractional digits, stored as an `i64` scaled by 10000.
///
/// The representable range is `-922337203685477.5808` to `922337203685477.5807`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal(i64);

impl Decimal {
    /// Build a decimal from its scaled representation (`12345` is `1.2345`).
    pub fn from_scaled(value: i64) -> Self {
        Decimal(value)
    }

    pub fn scaled(&self) -> i64 {
        self.0
    }
}

impl FromStr for Decimal {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = DECIMAL_PATTERN
            .captures(s)
            .ok_or_else(|| EvalError::DecimalParse(format!("`{s}` is not a well-formed decimal value")))?;

        let malformed = |_| EvalError::DecimalParse(format!("`{s}` is not a well-formed decimal value"));
        let whole: i128 = caps[2].parse().map_err(malformed)?;
        let digits = &caps[3];
        let mut fraction: i128 = digits.parse().map_err(malformed)?;
        for _ in digits.len()..FRACTION_DIGITS {
            fraction *= 10;
        }

        let mut scaled = whole * SCALE + fraction;
        if !caps[1].is_empty() {
            scaled = -scaled;
        }

        i64::try_from(scaled)
            .map(Decimal)
            .map_err(|_| EvalError::DecimalParse(format!("`{s}` is out of range")))
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let value = i128::from(self.0);
        let sign = if value < 0 { "-" } else { "" };
        let abs = value.abs();
        let fraction = format!("{:04}", abs % SCALE);
        let fraction = match fraction.trim_end_matches('0') {
            "" => "0",
            trimmed => trimmed,
        };
        write!(f, "{sign}{}.{fraction}", abs / SCALE)
    }
}
