//! Turns due recurring transactions into transactions.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error, UserID,
    recurring::{
        db::{advance_last_processed, get_active_recurring_transactions},
        domain::RecurringTransaction,
    },
    transaction::{Transaction, create_transaction},
};

/// Create a transaction for every recurring transaction of the user that is due by `today`.
///
/// Each recurring transaction advances by at most one step per call. Returns the number of
/// transactions that were created.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an unexpected SQL error. Occurrences created before
/// the error are kept.
pub fn process_due_transactions(
    user_id: &UserID,
    today: Date,
    connection: &Connection,
) -> Result<usize, Error> {
    let mut processed_count = 0;

    for recurring in get_active_recurring_transactions(user_id, connection)? {
        let Some(occurrence) = recurring.next_due_occurrence(today) else {
            continue;
        };

        if materialize_occurrence(&recurring, occurrence, connection)? {
            processed_count += 1;
        }
    }

    tracing::debug!("processed {processed_count} recurring transaction(s) for {user_id}");

    Ok(processed_count)
}

/// Create the transaction for one occurrence and move the template's last processed date to it.
///
/// Both changes happen in one SQL transaction. Returns `false` and changes nothing if
/// `recurring` is stale, i.e. another call already processed this occurrence.
pub fn materialize_occurrence(
    recurring: &RecurringTransaction,
    occurrence: Date,
    connection: &Connection,
) -> Result<bool, Error> {
    let transaction = connection.unchecked_transaction()?;

    if !advance_last_processed(
        recurring.id,
        recurring.last_processed,
        occurrence,
        &transaction,
    )? {
        tracing::info!(
            "skipping recurring transaction {} on {occurrence}, it was already processed",
            recurring.id
        );
        return Ok(false);
    }

    create_transaction(
        Transaction::build(
            recurring.amount,
            recurring.transaction_type,
            occurrence,
            &recurring.description,
            recurring.category_id,
        )
        .recurring_transaction_id(recurring.id),
        &recurring.user_id,
        &transaction,
    )?;

    transaction.commit()?;

    Ok(true)
}
