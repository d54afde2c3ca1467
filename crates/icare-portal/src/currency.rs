//! Exact currency amounts in the portal's `$#,###.##` notation.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// A dollar amount held as whole cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

/// A currency string that could not be read as an amount.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unable to parse currency value '{raw}'")]
pub struct ParseMoneyError {
    pub raw: String,
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parse strings such as `$5,234.50`, `-$59,026.66`, `$.00` or `1200`.
    ///
    /// More than two fractional digits are rounded half away from zero.
    pub fn parse(raw: &str) -> Result<Self, ParseMoneyError> {
        let err = || ParseMoneyError {
            raw: raw.to_string(),
        };

        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
            .collect();

        let (negative, body) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };

        if body.is_empty() {
            // A bare "-" is not an amount; an empty cell means nothing owed.
            return if negative { Err(err()) } else { Ok(Money::ZERO) };
        }

        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(err());
        }

        let dollars: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };

        let frac = frac.as_bytes();
        let digit = |i: usize| frac.get(i).map_or(0, |b| i64::from(b - b'0'));
        let mut cents = digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            cents += 1;
        }

        let total = dollars
            .checked_mul(100)
            .and_then(|d| d.checked_add(cents))
            .ok_or_else(err)?;

        Ok(Money(if negative { -total } else { total }))
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let dollars = (abs / 100).to_string();

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}${grouped}.{:02}", abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_portal_formats() {
        assert_eq!(Money::parse("$5,234.50").unwrap().cents(), 523_450);
        assert_eq!(Money::parse("-$59,026.66").unwrap().cents(), -5_902_666);
        assert_eq!(Money::parse("$.00").unwrap(), Money::ZERO);
        assert_eq!(Money::parse("$.5").unwrap().cents(), 50);
        assert_eq!(Money::parse("-.25").unwrap().cents(), -25);
        assert_eq!(Money::parse("1200").unwrap().cents(), 120_000);
        assert_eq!(Money::parse("").unwrap(), Money::ZERO);
        assert_eq!(Money::parse("$").unwrap(), Money::ZERO);
        assert_eq!(Money::parse(" $ 1,000.00 ").unwrap().cents(), 100_000);
    }

    #[test]
    fn test_parse_rounds_extra_precision() {
        assert_eq!(Money::parse("10.005").unwrap().cents(), 1001);
        assert_eq!(Money::parse("10.004").unwrap().cents(), 1000);
        assert_eq!(Money::parse("-10.005").unwrap().cents(), -1001);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::parse("N/A").is_err());
        assert!(Money::parse("-").is_err());
        assert!(Money::parse("1.2.3").is_err());
        assert!(Money::parse("$12a.00").is_err());
        let err = Money::parse("pending").unwrap_err();
        assert_eq!(err.raw, "pending");
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(0).to_string(), "$0.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(523_450).to_string(), "$5,234.50");
        assert_eq!(Money::from_cents(100_000_000).to_string(), "$1,000,000.00");
        assert_eq!(Money::from_cents(-5_902_666).to_string(), "-$59,026.66");
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        for cents in [0, 1, 99, 100, 523_450, 1_033_450, -5_902_666, 123_456_789] {
            let m = Money::from_cents(cents);
            assert_eq!(Money::parse(&m.to_string()).unwrap(), m);
        }
    }

    #[test]
    fn test_sum() {
        let total: Money = [523_450, 510_000]
            .into_iter()
            .map(Money::from_cents)
            .sum();
        assert_eq!(total.to_f64(), 10334.5);
    }
}
