//! Saves the transactions the user accepted from an import preview.

use std::collections::HashSet;

use axum::{Extension, Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use time::Date;

use crate::{
    Error, Money, TransactionType, UserID,
    category::{CategoryId, require_category},
    csv_import::preview::ImportState,
    extract::JsonBody,
    transaction::{ImportProvenance, Transaction, TransactionBuilder, import_transactions},
};

/// The request body for confirming an import.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmImportData {
    transactions: Option<Vec<ConfirmItem>>,
}

/// A transaction from [crate::csv_import::preview::ImportPreview::import_data], possibly edited
/// by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmItem {
    amount: Option<Decimal>,
    #[serde(rename = "type")]
    transaction_type: Option<TransactionType>,
    category_id: Option<CategoryId>,
    description: Option<String>,
    #[serde(default, with = "crate::date::iso_date::option")]
    date: Option<Date>,
    import_source: Option<String>,
    import_id: Option<String>,
    original_desc: Option<String>,
}

impl ConfirmItem {
    fn into_builder(self) -> Result<TransactionBuilder, Error> {
        let (Some(amount), Some(transaction_type), Some(category_id), Some(description), Some(date)) = (
            self.amount,
            self.transaction_type,
            self.category_id,
            self.description,
            self.date,
        ) else {
            return Err(Error::InvalidTransactionData);
        };

        let description = description.trim();

        if description.is_empty() {
            return Err(Error::InvalidTransactionData);
        }

        let amount = Money::positive(amount).map_err(|_| Error::InvalidTransactionData)?;
        let builder = Transaction::build(amount, transaction_type, date, description, category_id);

        // Rows without an import ID cannot be deduplicated, they are saved as plain transactions.
        match (self.import_source, self.import_id) {
            (Some(source), Some(import_id)) if !source.is_empty() && !import_id.is_empty() => {
                let original_description = self
                    .original_desc
                    .unwrap_or_else(|| description.to_owned());

                Ok(builder.import(ImportProvenance {
                    source,
                    import_id,
                    original_description,
                }))
            }
            _ => Ok(builder),
        }
    }
}

/// Route handler for saving the transactions from an import preview.
///
/// Transactions that were already imported are skipped. Either all of the new transactions are
/// saved or none are.
pub async fn confirm_import_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<ConfirmImportData>,
) -> Result<Json<Value>, Error> {
    let items = match data.transactions {
        Some(items) if !items.is_empty() => items,
        _ => return Err(Error::NoTransactionsToImport),
    };

    let builders = items
        .into_iter()
        .map(ConfirmItem::into_builder)
        .collect::<Result<Vec<_>, _>>()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category_ids: HashSet<CategoryId> =
        builders.iter().map(|builder| builder.category_id).collect();
    for category_id in category_ids {
        require_category(category_id, &user_id, &connection)?;
    }

    let transaction = connection.unchecked_transaction()?;
    let submitted = builders.len();
    let imported = import_transactions(builders, &user_id, &transaction)?;
    transaction.commit()?;

    tracing::info!(
        "Imported {imported} of {submitted} transactions for {user_id}, {} were duplicates",
        submitted - imported
    );

    Ok(Json(json!({ "success": true, "imported": imported })))
}
