//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use time::Date;

use crate::{
    Error, Money, TransactionType, UserID,
    category::{Category, CategoryId, map_category_row_with_offset, require_category},
    database_id::DatabaseId,
};

/// Database identifier for a transaction.
pub type TransactionId = DatabaseId;

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money spent or earned in this transaction, always positive.
    pub amount: Money,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "crate::date::iso_date")]
    pub date: Date,
    /// The ID of the category the transaction belongs to.
    pub category_id: CategoryId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// The recurring transaction that created this transaction, if any.
    pub recurring_transaction_id: Option<DatabaseId>,
    /// Where the transaction was imported from, e.g. "anz-csv".
    pub import_source: Option<String>,
    /// The identifier used to detect repeated imports of the same transaction.
    pub import_id: Option<String>,
    /// The description as it appeared in the imported file.
    pub original_description: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        amount: Money,
        transaction_type: TransactionType,
        date: Date,
        description: &str,
        category_id: CategoryId,
    ) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            transaction_type,
            date,
            description: description.to_owned(),
            category_id,
            recurring_transaction_id: None,
            import: None,
        }
    }
}

/// A transaction together with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionWithCategory {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub category: Category,
}

/// Where an imported transaction came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProvenance {
    /// The import format, e.g. "anz-csv".
    pub source: String,
    /// The deduplication identifier, unique per user and source.
    pub import_id: String,
    /// The description as it appeared in the imported file.
    pub original_description: String,
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// let builder = Transaction::build(
///         Money::new(Decimal::new(450, 2)),
///         TransactionType::Expense,
///         date!(2024 - 03 - 01),
///         "COFFEE SHOP",
///         category.id,
///     )
///     .import(ImportProvenance { ... });
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The positive amount of money that moved.
    pub amount: Money,

    /// Whether the money was earned or spent.
    pub transaction_type: TransactionType,

    /// The date when the transaction occurred.
    pub date: Date,

    /// A human-readable description of the transaction.
    pub description: String,

    /// The category of the transaction, e.g. "Groceries", "Transport", "Rent".
    pub category_id: CategoryId,

    /// The recurring transaction that this transaction is an occurrence of.
    pub recurring_transaction_id: Option<DatabaseId>,

    /// Set for transactions imported from a bank statement.
    ///
    /// The database enforces uniqueness on the source and import ID per user so that the same
    /// statement can be imported multiple times safely.
    pub import: Option<ImportProvenance>,
}

impl TransactionBuilder {
    /// Mark the transaction as imported.
    pub fn import(mut self, import: ImportProvenance) -> Self {
        self.import = Some(import);
        self
    }

    /// Link the transaction to the recurring transaction that created it.
    pub fn recurring_transaction_id(mut self, recurring_transaction_id: DatabaseId) -> Self {
        self.recurring_transaction_id = Some(recurring_transaction_id);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str = "id, amount, type, description, date, category_id, user_id, recurring_transaction_id, import_source, import_id, original_description";

pub(crate) const SELECT_TRANSACTION_WITH_CATEGORY: &str = "SELECT t.id, t.amount, t.type, t.description, t.date, t.category_id, t.user_id,
            t.recurring_transaction_id, t.import_source, t.import_id, t.original_description,
            c.id, c.name, c.type, c.color, c.user_id
     FROM \"transaction\" t
     INNER JOIN category c ON t.category_id = c.id";

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category is not one of the user's categories,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    require_category(builder.category_id, user_id, connection)?;

    let (import_source, import_id, original_description) = split_import(builder.import);

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\"
             (amount, type, description, date, category_id, user_id, recurring_transaction_id, import_source, import_id, original_description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.amount,
                builder.transaction_type,
                builder.description,
                builder.date,
                builder.category_id,
                user_id,
                builder.recurring_transaction_id,
                import_source,
                import_id,
                original_description,
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(builder.category_id),
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Import many transactions, skipping any whose import source and ID the user already has.
///
/// Returns the number of transactions that were inserted.
///
/// **Note**: If you want transactional integrity (all or nothing), pass in a
/// transaction for `connection`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn import_transactions(
    builders: Vec<TransactionBuilder>,
    user_id: &UserID,
    connection: &Connection,
) -> Result<usize, Error> {
    let mut imported_count = 0;

    // Prepare the insert statement once for reuse
    let mut statement = connection.prepare(
        "INSERT INTO \"transaction\"
         (amount, type, description, date, category_id, user_id, import_source, import_id, original_description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(user_id, import_source, import_id) DO NOTHING",
    )?;

    for builder in builders {
        let (import_source, import_id, original_description) = split_import(builder.import);

        imported_count += statement.execute((
            builder.amount,
            builder.transaction_type,
            builder.description,
            builder.date,
            builder.category_id,
            user_id,
            import_source,
            import_id,
            original_description,
        ))?;
    }

    Ok(imported_count)
}

/// Whether the user already has a transaction with `import_id` from `import_source`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error.
pub fn import_id_exists(
    import_source: &str,
    import_id: &str,
    user_id: &UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    let found: Option<i64> = connection
        .prepare(
            "SELECT 1 FROM \"transaction\"
             WHERE user_id = ?1 AND import_source = ?2 AND import_id = ?3
             LIMIT 1",
        )?
        .query_row((user_id, import_source, import_id), |row| row.get(0))
        .optional()?;

    Ok(found.is_some())
}

/// Retrieve one of the user's transactions by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to one of the user's transactions,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<TransactionWithCategory, Error> {
    let transaction = connection
        .prepare(&format!(
            "{SELECT_TRANSACTION_WITH_CATEGORY} WHERE t.id = :id AND t.user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": id, ":user_id": user_id},
            map_transaction_with_category_row,
        )?;

    Ok(transaction)
}

/// Replace the editable fields of a transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidCategory] if the category is not one of the user's categories,
/// - [Error::NotFound] if the transaction does not exist or belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(transaction: &Transaction, connection: &Connection) -> Result<(), Error> {
    require_category(transaction.category_id, &transaction.user_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE \"transaction\"
         SET amount = ?1, type = ?2, description = ?3, date = ?4, category_id = ?5
         WHERE id = ?6 AND user_id = ?7",
        (
            transaction.amount,
            transaction.transaction_type,
            &transaction.description,
            transaction.date,
            transaction.category_id,
            transaction.id,
            &transaction.user_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete one of the user's transactions.
///
/// # Errors
/// This function will return a [Error::NotFound] if the transaction does not exist or belongs
/// to another user, or an [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
                description TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                recurring_transaction_id INTEGER,
                import_source TEXT,
                import_id TEXT,
                original_description TEXT,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE RESTRICT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(recurring_transaction_id) REFERENCES recurring_transaction(id) ON UPDATE CASCADE ON DELETE SET NULL,
                UNIQUE(user_id, import_source, import_id)
                )",
        (),
    )?;

    // Add composite index used by the transaction list, budgets and reports.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_category ON \"transaction\"(category_id);",
        (),
    )?;

    Ok(())
}

fn split_import(
    import: Option<ImportProvenance>,
) -> (Option<String>, Option<String>, Option<String>) {
    match import {
        Some(import) => (
            Some(import.source),
            Some(import.import_id),
            Some(import.original_description),
        ),
        None => (None, None, None),
    }
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let raw_user_id: String = row.get(6)?;

    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        transaction_type: row.get(2)?,
        description: row.get(3)?,
        date: row.get(4)?,
        category_id: row.get(5)?,
        user_id: UserID::new(&raw_user_id),
        recurring_transaction_id: row.get(7)?,
        import_source: row.get(8)?,
        import_id: row.get(9)?,
        original_description: row.get(10)?,
    })
}

/// Map a row selected with [SELECT_TRANSACTION_WITH_CATEGORY] to a [TransactionWithCategory].
pub(crate) fn map_transaction_with_category_row(
    row: &Row,
) -> Result<TransactionWithCategory, rusqlite::Error> {
    Ok(TransactionWithCategory {
        transaction: map_transaction_row(row)?,
        category: map_category_row_with_offset(row, 11)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
