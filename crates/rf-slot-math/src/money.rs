//! Exact-decimal amounts and the monetary aggregator
//!
//! Amounts are fixed-point with eight fractional digits. Wins are multiplied
//! per icon and then summed, never summed in floating point first. Settlement
//! uses the `checked_*` operations and fails on overflow; the operator impls
//! saturate.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Fractional digits carried by [`Amount`]
pub const AMOUNT_DECIMALS: u32 = 8;

const SCALE: i64 = 100_000_000;

/// Fixed-point currency amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const ONE: Amount = Amount(SCALE);

    /// Amount from a whole number, saturating at the representable range
    pub const fn from_int(value: i64) -> Self {
        Self(value.saturating_mul(SCALE))
    }

    /// Amount from a whole number, `None` when out of range
    pub const fn checked_from_int(value: i64) -> Option<Self> {
        match value.checked_mul(SCALE) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Amount from raw fixed-point units
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw fixed-point units
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Multiply by a whole factor, saturating
    pub fn mul_int(self, factor: u64) -> Self {
        let product = self.0 as i128 * factor as i128;
        Self(saturate(product))
    }

    pub fn checked_mul_int(self, factor: u64) -> Option<Self> {
        let factor = i64::try_from(factor).ok()?;
        self.0.checked_mul(factor).map(Self)
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Product rounded half away from zero, `None` when out of range
    pub fn checked_mul(self, rhs: Amount) -> Option<Self> {
        i64::try_from(scaled_product(self, rhs)).ok().map(Self)
    }

    /// Ratio to another amount, for statistics only
    pub fn ratio_to(self, other: Amount) -> f64 {
        if other.0 == 0 {
            0.0
        } else {
            self.0 as f64 / other.0 as f64
        }
    }
}

fn saturate(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Fixed-point product rounded half away from zero at the last fractional digit
fn scaled_product(lhs: Amount, rhs: Amount) -> i128 {
    let product = lhs.0 as i128 * rhs.0 as i128;
    let scale = SCALE as i128;
    let half = scale / 2;
    if product >= 0 {
        (product + half) / scale
    } else {
        (product - half) / scale
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl Mul for Amount {
    type Output = Amount;

    fn mul(self, rhs: Amount) -> Amount {
        Amount(saturate(scaled_product(self, rhs)))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

impl FromStr for Amount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || ConfigError::InvalidValue(format!("not a decimal amount: {s:?}"));

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        // Trailing zeros beyond the carried precision are harmless
        let frac = frac.trim_end_matches('0');
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(ConfigError::InvalidValue(format!(
                "{s:?} has more than {AMOUNT_DECIMALS} fractional digits"
            )));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut frac_value: i64 = 0;
        for (i, c) in frac.chars().enumerate() {
            let digit = c.to_digit(10).ok_or_else(invalid)? as i64;
            frac_value += digit * 10_i64.pow(AMOUNT_DECIMALS - 1 - i as u32);
        }
        let raw = whole_value
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_value))
            .ok_or_else(invalid)?;
        Ok(Amount(if negative { -raw } else { raw }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u64;
        let frac = abs % SCALE as u64;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{:0width$}", frac, width = AMOUNT_DECIMALS as usize);
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Int(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match AmountRepr::deserialize(deserializer)? {
            AmountRepr::Text(text) => text.parse(),
            AmountRepr::Int(value) => Amount::checked_from_int(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!("amount {value} is out of range"))
            }),
            // Shortest round-trip formatting recovers the literal as written
            AmountRepr::Float(value) => value.to_string().parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKE
// ═══════════════════════════════════════════════════════════════════════════════

/// Bet parameters for one spin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    /// Coin size
    pub coin_size: Amount,
    /// Number of lines played
    pub lines: u32,
    /// Base line rate (defaults to 1)
    #[serde(default = "default_line_rate")]
    pub line_rate: Amount,
    /// Bonus buy multiplier on the total bet
    #[serde(default)]
    pub buy_multiplier: Option<u32>,
}

fn default_line_rate() -> Amount {
    Amount::ONE
}

impl Stake {
    pub fn new(coin_size: Amount, lines: u32) -> Self {
        Self {
            coin_size,
            lines,
            line_rate: default_line_rate(),
            buy_multiplier: None,
        }
    }

    /// Builder: request a bonus buy
    pub fn with_buy(mut self, multiplier: u32) -> Self {
        self.buy_multiplier = Some(multiplier);
        self
    }

    /// Stake per line
    pub fn line_bet(&self) -> Amount {
        self.coin_size * self.line_rate
    }

    /// Stake across all lines
    pub fn total_bet(&self) -> Amount {
        self.line_bet().mul_int(self.lines as u64)
    }

    /// Amount debited for a fresh base-game spin
    pub fn charge(&self) -> Amount {
        match self.buy_multiplier {
            Some(multiplier) => self.total_bet().mul_int(multiplier as u64),
            None => self.total_bet(),
        }
    }

    /// [`Self::charge`] without saturation
    pub fn checked_charge(&self) -> Result<Amount, ConfigError> {
        let overflow = || ConfigError::InvalidBet(format!("bet of {} lines overflows", self.lines));
        let total = self
            .coin_size
            .checked_mul(self.line_rate)
            .and_then(|line_bet| line_bet.checked_mul_int(self.lines as u64))
            .ok_or_else(overflow)?;
        match self.buy_multiplier {
            Some(multiplier) => total.checked_mul_int(multiplier as u64).ok_or_else(overflow),
            None => Ok(total),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.coin_size.is_positive() {
            return Err(ConfigError::InvalidBet(format!(
                "coin size must be positive, got {}",
                self.coin_size
            )));
        }
        if self.lines == 0 {
            return Err(ConfigError::InvalidBet("lines must be at least 1".into()));
        }
        if !self.line_rate.is_positive() {
            return Err(ConfigError::InvalidBet(format!(
                "line rate must be positive, got {}",
                self.line_rate
            )));
        }
        if self.buy_multiplier == Some(0) {
            return Err(ConfigError::InvalidBet("buy multiplier must be at least 1".into()));
        }
        self.checked_charge().map(|_| ())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGGREGATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Apply a step multiplier to each icon win and sum the products
///
/// `None` on overflow.
pub fn apply_multiplier<'a, I>(icon_wins: I, multiplier: u64) -> Option<Amount>
where
    I: IntoIterator<Item = &'a Amount>,
{
    icon_wins
        .into_iter()
        .try_fold(Amount::ZERO, |sum, win| sum.checked_add(win.checked_mul_int(multiplier)?))
}

fn checked_sum(amounts: &[Amount]) -> Option<Amount> {
    amounts
        .iter()
        .try_fold(Amount::ZERO, |sum, &amount| sum.checked_add(amount))
}

/// Monetary figures for one engine step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFigures {
    /// Win before multipliers
    pub base_win: Amount,
    /// Multiplier applied to this step's icon wins
    pub multiplier: u64,
    /// Win after multipliers
    pub step_win: Amount,
    /// Win accumulated over the cascade chain so far
    pub cumulative_win: Amount,
    /// Free-game run total once the run terminates
    pub free_game_total: Option<Amount>,
    /// Amount charged for this step (zero during free spins and cascades)
    pub bet_charged: Amount,
    /// `step_win - bet_charged`
    pub profit: Amount,
}

impl StepFigures {
    /// Settle a step: multiply each icon win, then accumulate onto the chain
    pub fn settle(
        icon_wins: &[Amount],
        multiplier: u64,
        prior_cumulative: Amount,
        bet_charged: Amount,
    ) -> Result<Self, ConfigError> {
        let overflow = || ConfigError::InvalidValue("step win overflows the amount range".into());
        let multiplier = multiplier.max(1);
        let base_win = checked_sum(icon_wins).ok_or_else(overflow)?;
        let step_win = apply_multiplier(icon_wins, multiplier).ok_or_else(overflow)?;
        Ok(Self {
            base_win,
            multiplier,
            step_win,
            cumulative_win: prior_cumulative.checked_add(step_win).ok_or_else(overflow)?,
            free_game_total: None,
            bet_charged,
            profit: step_win.checked_sub(bet_charged).ok_or_else(overflow)?,
        })
    }
}
