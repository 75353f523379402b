// crates/tessera-core/src/trust.rs
//
// Exact-ratio trust values and the per-peer trust record.
//
// Trust values are kept as reduced fractions rather than floats so that the
// uniform fallback shares (1/n each) add up to exactly one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;
use crate::identity::PeerId;

/// Non-negative exact ratio used as a trust score.
///
/// Always stored in lowest terms with a non-zero denominator, so the derived
/// equality is value equality. Values attached to emitted [`Trust`] records
/// lie in `[0, 1]`; intermediates such as `from_int(3)` may not.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TrustValue {
    num: u64,
    den: u64,
}

impl TrustValue {
    /// No trust.
    pub const ZERO: TrustValue = TrustValue { num: 0, den: 1 };
    /// Full trust.
    pub const ONE: TrustValue = TrustValue { num: 1, den: 1 };

    /// The integer `n` as a ratio.
    pub const fn from_int(n: u64) -> Self {
        Self { num: n, den: 1 }
    }

    /// `num / den` in lowest terms. Fails on a zero denominator.
    pub fn from_ratio(num: u64, den: u64) -> Result<Self, TesseraError> {
        reduce(num as u128, den as u128)
    }

    pub fn numerator(&self) -> u64 {
        self.num
    }

    pub fn denominator(&self) -> u64 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Whether the value lies in `[0, 1]`.
    pub fn in_unit_range(&self) -> bool {
        self.num <= self.den
    }

    /// `self / rhs`, exact. Fails on division by zero or if the reduced
    /// result does not fit in `u64` terms.
    pub fn checked_div(self, rhs: TrustValue) -> Result<TrustValue, TesseraError> {
        if rhs.num == 0 {
            return Err(TesseraError::Arithmetic(format!(
                "division of {} by zero",
                self
            )));
        }
        reduce(
            self.num as u128 * rhs.den as u128,
            self.den as u128 * rhs.num as u128,
        )
    }

    /// `self + rhs`, exact.
    pub fn checked_add(self, rhs: TrustValue) -> Result<TrustValue, TesseraError> {
        let num = (self.num as u128 * rhs.den as u128)
            .checked_add(rhs.num as u128 * self.den as u128)
            .ok_or_else(|| {
                TesseraError::Arithmetic(format!("sum of {} and {} overflows", self, rhs))
            })?;
        let den = self.den as u128 * rhs.den as u128;
        reduce(num, den)
    }

    /// Exact sum of a sequence of values.
    pub fn checked_sum<I>(values: I) -> Result<TrustValue, TesseraError>
    where
        I: IntoIterator<Item = TrustValue>,
    {
        values
            .into_iter()
            .try_fold(TrustValue::ZERO, |acc, v| acc.checked_add(v))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn reduce(num: u128, den: u128) -> Result<TrustValue, TesseraError> {
    if den == 0 {
        return Err(TesseraError::Arithmetic(format!(
            "zero denominator in {}/{}",
            num, den
        )));
    }
    if num == 0 {
        return Ok(TrustValue::ZERO);
    }
    let g = gcd(num, den);
    let (num, den) = (num / g, den / g);
    match (u64::try_from(num), u64::try_from(den)) {
        (Ok(num), Ok(den)) => Ok(TrustValue { num, den }),
        _ => Err(TesseraError::Arithmetic(format!(
            "ratio {}/{} overflows u64 terms",
            num, den
        ))),
    }
}

impl Default for TrustValue {
    fn default() -> Self {
        TrustValue::ZERO
    }
}

impl Ord for TrustValue {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num as u128 * other.den as u128).cmp(&(other.num as u128 * self.den as u128))
    }
}

impl PartialOrd for TrustValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TrustValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Debug for TrustValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustValue({}/{})", self.num, self.den)
    }
}

impl FromStr for TrustValue {
    type Err = TesseraError;

    /// Parses `"n/d"` or a bare integer `"n"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim().parse::<u64>().map_err(|e| {
                TesseraError::Serialization(format!("invalid trust value {:?}: {}", s, e))
            })
        };
        match s.split_once('/') {
            Some((num, den)) => TrustValue::from_ratio(parse(num)?, parse(den)?),
            None => Ok(TrustValue::from_int(parse(s)?)),
        }
    }
}

impl From<TrustValue> for String {
    fn from(v: TrustValue) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for TrustValue {
    type Error = TesseraError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One node's opinion of one peer for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trust {
    peer: PeerId,
    value: TrustValue,
}

impl Trust {
    pub fn new(peer: PeerId, value: TrustValue) -> Self {
        Self { peer, value }
    }

    /// The peer this opinion is about.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn value(&self) -> TrustValue {
        self.value
    }
}
