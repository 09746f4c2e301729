//! An exact decimal amount of money.

use std::{fmt, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// An amount of money.
///
/// Amounts are kept as exact decimals so that sums over many transactions do not drift.
/// They are stored in SQLite as text and serialized in JSON as numbers.
/// The largest amount, in dollars, accepted for a single transaction, budget or recurring
/// transaction.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Create an amount from a decimal.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount that must be strictly positive, e.g. the amount of a transaction.
    ///
    /// # Errors
    /// Returns an [Error::InvalidAmount] if `amount` is zero, negative or greater than
    /// [MAX_AMOUNT].
    pub fn positive(amount: Decimal) -> Result<Self, Error> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "{} must be greater than zero",
                amount.normalize()
            )));
        }

        if amount > Decimal::from(MAX_AMOUNT) {
            return Err(Error::InvalidAmount(format!(
                "{} must not be greater than {MAX_AMOUNT}",
                amount.normalize()
            )));
        }

        Ok(Self(amount))
    }

    /// Add two amounts.
    ///
    /// # Errors
    /// Returns an [Error::AmountOverflow] if the sum cannot be represented.
    pub fn checked_add(self, rhs: Money) -> Result<Money, Error> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(Error::AmountOverflow("add up"))
    }

    /// Subtract `rhs` from this amount.
    ///
    /// # Errors
    /// Returns an [Error::AmountOverflow] if the difference cannot be represented.
    pub fn checked_sub(self, rhs: Money) -> Result<Money, Error> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(Error::AmountOverflow("subtract"))
    }

    /// Add up `amounts`, starting from zero.
    ///
    /// # Errors
    /// Returns an [Error::AmountOverflow] if the total cannot be represented.
    pub fn try_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, Error> {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }

    /// The underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the amount is less than zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// The absolute value of the amount.
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

/// Formats the amount without trailing zeros, e.g. `4.50` is written as `4.5`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|error| Error::InvalidAmount(format!("could not parse \"{s}\": {error}")))
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(_) => Decimal::from_str(value.as_str()?)
                .map(Self)
                .map_err(|error| FromSqlError::Other(Box::new(error))),
            ValueRef::Integer(integer) => Ok(Self(Decimal::from(integer))),
            ValueRef::Real(real) => Decimal::try_from(real)
                .map(Self)
                .map_err(|error| FromSqlError::Other(Box::new(error))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
