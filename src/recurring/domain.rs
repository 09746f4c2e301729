//! Recurring transaction templates and the rules for when they are due.

use std::{fmt, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{
    Money, TransactionType, UserID,
    category::{Category, CategoryId},
    database_id::DatabaseId,
    date::add_months,
};

/// Database identifier for a recurring transaction.
pub type RecurringTransactionId = DatabaseId;

/// How often a recurring transaction happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// The name used in JSON and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    /// The date one step after `date`.
    ///
    /// Monthly and yearly steps land on the last day of the month when the day does not exist,
    /// e.g. one month after 31 January 2024 is 29 February 2024.
    /// Returns `None` if the step would go past the largest supported date.
    pub fn next_date(&self, date: Date) -> Option<Date> {
        match self {
            Frequency::Daily => date.next_day(),
            Frequency::Weekly => date.checked_add(Duration::weeks(1)),
            Frequency::Monthly => add_months(date, 1),
            Frequency::Yearly => add_months(date, 12),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(format!("unknown frequency \"{other}\"")),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A template for a transaction that happens on a schedule, e.g. rent or a salary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTransaction {
    pub id: RecurringTransactionId,
    pub amount: Money,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category_id: CategoryId,
    pub description: String,
    pub frequency: Frequency,
    #[serde(with = "crate::date::iso_date")]
    pub start_date: Date,
    #[serde(with = "crate::date::iso_date::option")]
    pub end_date: Option<Date>,
    /// The date of the most recent occurrence that was turned into a transaction.
    #[serde(with = "crate::date::iso_date::option")]
    pub last_processed: Option<Date>,
    /// Paused templates are never processed.
    pub is_active: bool,
    pub user_id: UserID,
}

impl RecurringTransaction {
    /// The date of the next occurrence that should be turned into a transaction by `today`.
    ///
    /// A template that has never been processed is due on its start date. Otherwise the next
    /// occurrence is one step after the last processed date. At most one occurrence is due at
    /// a time, missed occurrences are picked up by later calls.
    ///
    /// Returns `None` when the template is paused, has ended before `today`, the next
    /// occurrence is after `today` or the next occurrence is after the end date.
    pub fn next_due_occurrence(&self, today: Date) -> Option<Date> {
        if !self.is_active || self.end_date.is_some_and(|end_date| end_date < today) {
            return None;
        }

        let occurrence = match self.last_processed {
            None => self.start_date,
            Some(last_processed) => self.frequency.next_date(last_processed)?,
        };

        if occurrence > today || self.end_date.is_some_and(|end_date| occurrence > end_date) {
            return None;
        }

        Some(occurrence)
    }
}

/// A recurring transaction together with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurringWithCategory {
    #[serde(flatten)]
    pub recurring: RecurringTransaction,
    pub category: Category,
}

/// The fields of a recurring transaction sent by the client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringData {
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    #[serde(default, with = "crate::date::iso_date::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::date::iso_date::option")]
    pub end_date: Option<Date>,
    pub is_active: Option<bool>,
}
