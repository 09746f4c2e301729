//! Database operations for recurring transactions.

use rusqlite::{Connection, Row};
use time::Date;

use crate::{
    Error, Money, TransactionType, UserID,
    category::{CategoryId, map_category_row_with_offset, require_category},
    recurring::domain::{
        Frequency, RecurringTransaction, RecurringTransactionId, RecurringWithCategory,
    },
};

const RECURRING_COLUMNS: &str = "r.id, r.amount, r.type, r.category_id, r.description, r.frequency, r.start_date,
            r.end_date, r.last_processed, r.is_active, r.user_id";

/// The fields needed to create a recurring transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecurringTransaction {
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub category_id: CategoryId,
    pub description: String,
    pub frequency: Frequency,
    pub start_date: Date,
    pub end_date: Option<Date>,
}

/// Create an active recurring transaction that has not been processed yet.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category is not one of the user's categories,
/// - [Error::InvalidDateRange] if the end date is before the start date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_recurring_transaction(
    recurring: NewRecurringTransaction,
    user_id: &UserID,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    validate_dates(recurring.start_date, recurring.end_date)?;
    require_category(recurring.category_id, user_id, connection)?;

    connection.execute(
        "INSERT INTO recurring_transaction
         (amount, type, category_id, description, frequency, start_date, end_date, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            recurring.amount,
            recurring.transaction_type,
            recurring.category_id,
            &recurring.description,
            recurring.frequency,
            recurring.start_date,
            recurring.end_date,
            user_id,
        ),
    )?;

    Ok(RecurringTransaction {
        id: connection.last_insert_rowid(),
        amount: recurring.amount,
        transaction_type: recurring.transaction_type,
        category_id: recurring.category_id,
        description: recurring.description,
        frequency: recurring.frequency,
        start_date: recurring.start_date,
        end_date: recurring.end_date,
        last_processed: None,
        is_active: true,
        user_id: user_id.clone(),
    })
}

/// Retrieve one of the user's recurring transactions with its category.
///
/// # Errors
/// Returns an [Error::NotFound] if the recurring transaction does not exist or belongs to
/// another user.
pub fn get_recurring_transaction(
    id: RecurringTransactionId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<RecurringWithCategory, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_COLUMNS}, c.id, c.name, c.type, c.color, c.user_id
             FROM recurring_transaction r
             INNER JOIN category c ON r.category_id = c.id
             WHERE r.id = :id AND r.user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": id, ":user_id": user_id},
            map_recurring_with_category_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of the user's recurring transactions, most recently created first.
pub fn get_all_recurring_transactions(
    user_id: &UserID,
    connection: &Connection,
) -> Result<Vec<RecurringWithCategory>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_COLUMNS}, c.id, c.name, c.type, c.color, c.user_id
             FROM recurring_transaction r
             INNER JOIN category c ON r.category_id = c.id
             WHERE r.user_id = :user_id
             ORDER BY r.id DESC"
        ))?
        .query_map(
            rusqlite::named_params! {":user_id": user_id},
            map_recurring_with_category_row,
        )?
        .map(|recurring_result| recurring_result.map_err(Error::SqlError))
        .collect()
}

/// Retrieve the user's recurring transactions that are not paused.
pub fn get_active_recurring_transactions(
    user_id: &UserID,
    connection: &Connection,
) -> Result<Vec<RecurringTransaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_transaction r
             WHERE r.user_id = :user_id AND r.is_active = 1
             ORDER BY r.id ASC"
        ))?
        .query_map(
            rusqlite::named_params! {":user_id": user_id},
            map_recurring_row,
        )?
        .map(|recurring_result| recurring_result.map_err(Error::SqlError))
        .collect()
}

/// Save the editable fields of a recurring transaction.
///
/// The last processed date is not changed.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the recurring transaction does not exist or belongs to another user,
/// - [Error::InvalidCategory] if the category is not one of the user's categories,
/// - [Error::InvalidDateRange] if the end date is before the start date,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_recurring_transaction(
    recurring: &RecurringTransaction,
    connection: &Connection,
) -> Result<(), Error> {
    validate_dates(recurring.start_date, recurring.end_date)?;
    require_category(recurring.category_id, &recurring.user_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE recurring_transaction
         SET amount = ?1, type = ?2, category_id = ?3, description = ?4, frequency = ?5,
             start_date = ?6, end_date = ?7, is_active = ?8
         WHERE id = ?9 AND user_id = ?10",
        (
            recurring.amount,
            recurring.transaction_type,
            recurring.category_id,
            &recurring.description,
            recurring.frequency,
            recurring.start_date,
            recurring.end_date,
            recurring.is_active,
            recurring.id,
            &recurring.user_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete one of the user's recurring transactions.
///
/// Transactions that were created from it are kept and lose their link to it.
///
/// # Errors
/// Returns an [Error::NotFound] if the recurring transaction does not exist or belongs to
/// another user.
pub fn delete_recurring_transaction(
    id: RecurringTransactionId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM recurring_transaction WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Move the last processed date of a recurring transaction from `previous` to `next`.
///
/// Returns `false` without changing anything if the stored date is no longer `previous`, i.e.
/// the occurrence has already been processed.
pub fn advance_last_processed(
    id: RecurringTransactionId,
    previous: Option<Date>,
    next: Date,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "UPDATE recurring_transaction SET last_processed = ?1
         WHERE id = ?2 AND last_processed IS ?3",
        (next, id, previous),
    )?;

    Ok(rows_affected == 1)
}

/// Initialize the recurring transaction table and indexes.
pub fn create_recurring_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
            category_id INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            frequency TEXT NOT NULL CHECK (frequency IN ('DAILY', 'WEEKLY', 'MONTHLY', 'YEARLY')),
            start_date TEXT NOT NULL,
            end_date TEXT,
            last_processed TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            user_id TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE RESTRICT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_recurring_transaction_user
            ON recurring_transaction(user_id, is_active);",
    )?;

    Ok(())
}

fn validate_dates(start_date: Date, end_date: Option<Date>) -> Result<(), Error> {
    match end_date {
        Some(end_date) if end_date < start_date => Err(Error::InvalidDateRange(format!(
            "the end date {end_date} is before the start date {start_date}"
        ))),
        _ => Ok(()),
    }
}

fn map_recurring_row(row: &Row) -> Result<RecurringTransaction, rusqlite::Error> {
    let raw_user_id: String = row.get(10)?;

    Ok(RecurringTransaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        transaction_type: row.get(2)?,
        category_id: row.get(3)?,
        description: row.get(4)?,
        frequency: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        last_processed: row.get(8)?,
        is_active: row.get(9)?,
        user_id: UserID::new(&raw_user_id),
    })
}

fn map_recurring_with_category_row(row: &Row) -> Result<RecurringWithCategory, rusqlite::Error> {
    Ok(RecurringWithCategory {
        recurring: map_recurring_row(row)?,
        category: map_category_row_with_offset(row, 11)?,
    })
}
