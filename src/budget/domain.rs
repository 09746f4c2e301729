//! Budget types and the spending calculations derived from them.

use std::{fmt, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, Money, UserID, category::Category, category::CategoryId, database_id::DatabaseId,
};

/// Database identifier for a budget.
pub type BudgetId = DatabaseId;

/// The alert threshold used when a budget is created without one.
pub const DEFAULT_ALERT_THRESHOLD: i64 = 80;

/// How often a budget's spending cap resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    /// The name used in JSON and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "WEEKLY",
            BudgetPeriod::Monthly => "MONTHLY",
            BudgetPeriod::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WEEKLY" => Ok(BudgetPeriod::Weekly),
            "MONTHLY" => Ok(BudgetPeriod::Monthly),
            "YEARLY" => Ok(BudgetPeriod::Yearly),
            other => Err(format!("unknown budget period \"{other}\"")),
        }
    }
}

impl ToSql for BudgetPeriod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BudgetPeriod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A spending cap on one category of expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: BudgetId,
    pub category_id: CategoryId,
    /// The most that should be spent in the category.
    pub amount: Money,
    pub period: BudgetPeriod,
    #[serde(with = "crate::date::iso_date")]
    pub start_date: Date,
    /// The budget has no end when this is `None`.
    #[serde(with = "crate::date::iso_date::option")]
    pub end_date: Option<Date>,
    /// The percentage of the budget that has to be used before an alert is raised.
    pub alert_threshold: i64,
    pub user_id: UserID,
}

/// A budget with the spending in its window.
///
/// None of the spending fields are stored, they are worked out each time a budget is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetWithSpending {
    #[serde(flatten)]
    pub budget: Budget,
    pub category: Category,
    pub spent: Money,
    /// Negative once the budget has been overspent.
    pub remaining: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub percent_used: Decimal,
    pub alert_triggered: bool,
}

impl BudgetWithSpending {
    /// Work out the spending fields of `budget` given the total `spent` in its window.
    ///
    /// # Errors
    /// Returns an [Error::AmountOverflow] if `spent` is too large compared to the budget.
    pub fn new(budget: Budget, category: Category, spent: Money) -> Result<Self, Error> {
        let percent_used = percent_used(spent, budget.amount)?;
        let alert_triggered = percent_used >= Decimal::from(budget.alert_threshold);

        Ok(Self {
            remaining: budget.amount.checked_sub(spent)?,
            percent_used,
            alert_triggered,
            spent,
            budget,
            category,
        })
    }
}

/// `spent` as a percentage of `amount`, rounded to two decimal places.
///
/// Nothing spent is always zero percent.
///
/// # Errors
/// Returns an [Error::AmountOverflow] if the percentage cannot be represented.
pub fn percent_used(spent: Money, amount: Money) -> Result<Decimal, Error> {
    if spent.is_zero() || amount.is_zero() {
        return Ok(Decimal::ZERO);
    }

    spent
        .as_decimal()
        .checked_div(amount.as_decimal())
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percent| percent.round_dp(2).normalize())
        .ok_or(Error::AmountOverflow("work out the percentage used"))
}

/// The fields of a budget sent by the client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetData {
    pub category_id: Option<CategoryId>,
    pub amount: Option<Decimal>,
    pub period: Option<BudgetPeriod>,
    #[serde(default, with = "crate::date::iso_date::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::date::iso_date::option")]
    pub end_date: Option<Date>,
    pub alert_threshold: Option<i64>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        Error, Money, TransactionType, UserID,
        budget::domain::{Budget, BudgetPeriod, BudgetWithSpending, percent_used},
        category::{Category, CategoryName},
    };

    fn dollars(amount: i64) -> Money {
        Money::new(Decimal::from(amount))
    }

    fn test_budget(amount: i64, alert_threshold: i64) -> (Budget, Category) {
        let user_id = UserID::new("test-user");
        let category = Category {
            id: 1,
            name: CategoryName::new_unchecked("Groceries"),
            category_type: TransactionType::Expense,
            color: "#00FF00".to_owned(),
            user_id: user_id.clone(),
        };
        let budget = Budget {
            id: 1,
            category_id: category.id,
            amount: dollars(amount),
            period: BudgetPeriod::Monthly,
            start_date: date!(2024 - 03 - 01),
            end_date: None,
            alert_threshold,
            user_id,
        };

        (budget, category)
    }

    #[test]
    fn spending_is_derived_from_the_amount_spent() {
        let (budget, category) = test_budget(500, 80);

        let got = BudgetWithSpending::new(budget, category, dollars(450)).unwrap();

        assert_eq!(got.spent, dollars(450));
        assert_eq!(got.remaining, dollars(50));
        assert_eq!(got.percent_used, Decimal::from(90));
        assert!(got.alert_triggered);
    }

    #[test]
    fn nothing_spent_is_zero_percent() {
        assert_eq!(percent_used(Money::ZERO, dollars(500)), Ok(Decimal::ZERO));
    }

    #[test]
    fn alert_is_not_triggered_below_threshold() {
        let (budget, category) = test_budget(500, 95);

        let got = BudgetWithSpending::new(budget, category, dollars(450)).unwrap();

        assert!(!got.alert_triggered);
    }

    #[test]
    fn overspending_gives_negative_remaining() {
        let (budget, category) = test_budget(100, 80);

        let got = BudgetWithSpending::new(budget, category, dollars(125)).unwrap();

        assert_eq!(got.remaining, dollars(-25));
        assert_eq!(got.percent_used, Decimal::from(125));
    }

    #[test]
    fn percent_used_that_does_not_fit_is_an_error() {
        let spent = Money::new(Decimal::from_scientific("1e27").unwrap());

        assert_eq!(
            percent_used(spent, dollars(1)),
            Err(Error::AmountOverflow("work out the percentage used"))
        );
    }

    #[test]
    fn percent_used_is_rounded() {
        assert_eq!(
            percent_used(dollars(1), dollars(3)),
            Ok(Decimal::new(3333, 2))
        );
    }

    #[test]
    fn serializes_with_spending_fields() {
        let (budget, category) = test_budget(500, 80);

        let json =
            serde_json::to_value(BudgetWithSpending::new(budget, category, dollars(450)).unwrap())
                .unwrap();

        assert_eq!(json["amount"], 500.0);
        assert_eq!(json["spent"], 450.0);
        assert_eq!(json["percentUsed"], 90.0);
        assert_eq!(json["alertTriggered"], true);
        assert_eq!(json["period"], "MONTHLY");
        assert_eq!(json["startDate"], "2024-03-01");
        assert_eq!(json["endDate"], serde_json::Value::Null);
        assert_eq!(json["category"]["name"], "Groceries");
    }
}
