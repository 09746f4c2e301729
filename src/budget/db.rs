//! Database operations for budgets.

use rusqlite::{Connection, Row};
use time::Date;

use crate::{
    Error, Money, UserID,
    budget::domain::{Budget, BudgetId, BudgetPeriod, BudgetWithSpending},
    category::{CategoryId, map_category_row_with_offset, require_category},
};

const SELECT_BUDGET_WITH_CATEGORY: &str = "SELECT b.id, b.category_id, b.amount, b.period, b.start_date, b.end_date,
            b.alert_threshold, b.user_id,
            c.id, c.name, c.type, c.color, c.user_id
     FROM budget b
     INNER JOIN category c ON b.category_id = c.id";

/// The fields needed to create a budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBudget {
    pub category_id: CategoryId,
    pub amount: Money,
    pub period: BudgetPeriod,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub alert_threshold: i64,
}

/// Create a budget for `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category is not one of the user's categories,
/// - [Error::InvalidAlertThreshold] if the threshold is not between 0 and 100,
/// - [Error::InvalidDateRange] if the end date is before the start date,
/// - [Error::DuplicateBudget] if the user already has a budget for the same category, period
///   and start date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(
    budget: NewBudget,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Budget, Error> {
    validate_budget(budget.alert_threshold, budget.start_date, budget.end_date)?;
    require_category(budget.category_id, user_id, connection)?;

    connection
        .execute(
            "INSERT INTO budget (category_id, amount, period, start_date, end_date, alert_threshold, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                budget.category_id,
                budget.amount,
                budget.period,
                budget.start_date,
                budget.end_date,
                budget.alert_threshold,
                user_id,
            ),
        )
        .map_err(map_unique_violation)?;

    Ok(Budget {
        id: connection.last_insert_rowid(),
        category_id: budget.category_id,
        amount: budget.amount,
        period: budget.period,
        start_date: budget.start_date,
        end_date: budget.end_date,
        alert_threshold: budget.alert_threshold,
        user_id: user_id.clone(),
    })
}

/// Retrieve one of the user's budgets with the spending in its window.
///
/// # Errors
/// Returns an [Error::NotFound] if the budget does not exist or belongs to another user.
pub fn get_budget(
    budget_id: BudgetId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<BudgetWithSpending, Error> {
    let (budget, category) = connection
        .prepare(&format!(
            "{SELECT_BUDGET_WITH_CATEGORY} WHERE b.id = :id AND b.user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": budget_id, ":user_id": user_id},
            |row| Ok((map_budget_row(row)?, map_category_row_with_offset(row, 8)?)),
        )?;

    let spent = get_spent(&budget, connection)?;

    BudgetWithSpending::new(budget, category, spent)
}

/// Retrieve all of the user's budgets, newest start date first, with their spending.
pub fn get_all_budgets(
    user_id: &UserID,
    connection: &Connection,
) -> Result<Vec<BudgetWithSpending>, Error> {
    let budgets = connection
        .prepare(&format!(
            "{SELECT_BUDGET_WITH_CATEGORY} WHERE b.user_id = :user_id
             ORDER BY b.start_date DESC, b.id DESC"
        ))?
        .query_map(rusqlite::named_params! {":user_id": user_id}, |row| {
            Ok((map_budget_row(row)?, map_category_row_with_offset(row, 8)?))
        })?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;

    budgets
        .into_iter()
        .map(|(budget, category)| {
            let spent = get_spent(&budget, connection)?;
            BudgetWithSpending::new(budget, category, spent)
        })
        .collect()
}

/// The total of the expenses in the budget's category and date window.
///
/// The window includes both the start date and, if there is one, the end date.
pub fn get_spent(budget: &Budget, connection: &Connection) -> Result<Money, Error> {
    connection
        .prepare(
            "SELECT amount FROM \"transaction\"
             WHERE user_id = ?1 AND category_id = ?2 AND type = 'EXPENSE'
               AND date >= ?3 AND (?4 IS NULL OR date <= ?4)",
        )?
        .query_map(
            (
                &budget.user_id,
                budget.category_id,
                budget.start_date,
                budget.end_date,
            ),
            |row| row.get::<_, Money>(0),
        )?
        .try_fold(Money::ZERO, |total, amount| -> Result<Money, Error> {
            total.checked_add(amount?)
        })
}

/// Save the editable fields of a budget.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the budget does not exist or belongs to another user,
/// - [Error::InvalidCategory] if the new category is not one of the user's categories,
/// - [Error::DuplicateBudget] if the change clashes with another budget,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_budget(budget: &Budget, connection: &Connection) -> Result<(), Error> {
    validate_budget(budget.alert_threshold, budget.start_date, budget.end_date)?;
    require_category(budget.category_id, &budget.user_id, connection)?;

    let rows_affected = connection
        .execute(
            "UPDATE budget
             SET category_id = ?1, amount = ?2, period = ?3, start_date = ?4, end_date = ?5,
                 alert_threshold = ?6
             WHERE id = ?7 AND user_id = ?8",
            (
                budget.category_id,
                budget.amount,
                budget.period,
                budget.start_date,
                budget.end_date,
                budget.alert_threshold,
                budget.id,
                &budget.user_id,
            ),
        )
        .map_err(map_unique_violation)?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete one of the user's budgets.
///
/// # Errors
/// Returns an [Error::NotFound] if the budget does not exist or belongs to another user.
pub fn delete_budget(
    budget_id: BudgetId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget WHERE id = ?1 AND user_id = ?2",
        (budget_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Initialize the budget table and indexes.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            period TEXT NOT NULL CHECK (period IN ('WEEKLY', 'MONTHLY', 'YEARLY')),
            start_date TEXT NOT NULL,
            end_date TEXT,
            alert_threshold INTEGER NOT NULL DEFAULT 80,
            user_id TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(user_id, category_id, period, start_date)
        );

        CREATE INDEX IF NOT EXISTS idx_budget_user ON budget(user_id, start_date);",
    )?;

    Ok(())
}

fn validate_budget(
    alert_threshold: i64,
    start_date: Date,
    end_date: Option<Date>,
) -> Result<(), Error> {
    if !(0..=100).contains(&alert_threshold) {
        return Err(Error::InvalidAlertThreshold(alert_threshold));
    }

    match end_date {
        Some(end_date) if end_date < start_date => Err(Error::InvalidDateRange(format!(
            "the end date {end_date} is before the start date {start_date}"
        ))),
        _ => Ok(()),
    }
}

fn map_unique_violation(error: rusqlite::Error) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateBudget,
        error => error.into(),
    }
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    let raw_user_id: String = row.get(7)?;

    Ok(Budget {
        id: row.get(0)?,
        category_id: row.get(1)?,
        amount: row.get(2)?,
        period: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        alert_threshold: row.get(6)?,
        user_id: UserID::new(&raw_user_id),
    })
}
