//! Builds a preview of the transactions in an uploaded ANZ statement.
//!
//! Nothing is saved to the transaction table here: the client shows the preview and then sends
//! the accepted transactions to the confirm endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Multipart, State, multipart::Field},
};
use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    AppState, Error, Money, TransactionType, UserID,
    category::{CategoryId, CategoryName, get_or_create_category},
    csv_import::anz::{ANZ_IMPORT_SOURCE, ParsedStatement, SkippedRow, parse_anz_csv},
    rule::RuleMatcher,
    transaction::import_id_exists,
};

/// The number of transactions included in [ImportPreview::preview].
pub const PREVIEW_LENGTH: usize = 10;

/// The multipart field that holds the uploaded statement.
const FILE_FIELD: &str = "file";

const UNCATEGORIZED: &str = "Uncategorized";
const UNCATEGORIZED_COLOR: &str = "#6B7280";
const OTHER_INCOME: &str = "Other Income";
const OTHER_INCOME_COLOR: &str = "#10B981";

/// The state needed for importing transactions.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A short summary of a transaction for showing to the user before importing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewItem {
    #[serde(with = "crate::date::iso_date")]
    pub date: Date,
    pub amount: Money,
    pub description: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

/// A transaction that is ready to be sent to the confirm endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    pub amount: Money,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The category chosen by the user's rules, or the fallback category for the type.
    pub category_id: CategoryId,
    pub description: String,
    #[serde(with = "crate::date::iso_date")]
    pub date: Date,
    pub import_source: String,
    pub import_id: String,
    pub original_desc: String,
}

/// The response to uploading a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    /// The number of rows that were read as transactions.
    pub total: usize,
    /// The number of transactions that have not been imported before.
    pub new: usize,
    /// The number of transactions that have been imported before.
    pub duplicates: usize,
    /// The number of rows that could not be read as transactions.
    pub skipped: usize,
    pub skipped_rows: Vec<SkippedRow>,
    pub preview: Vec<PreviewItem>,
    pub import_data: Vec<ImportItem>,
}

/// Route handler for uploading an ANZ CSV statement.
///
/// Expects a multipart form with the statement in the field "file". Returns the new
/// transactions, categorized by the user's rules, for the client to confirm.
pub async fn import_anz_endpoint(
    State(state): State<ImportState>,
    Extension(user_id): Extension<UserID>,
    multipart: Multipart,
) -> Result<Json<ImportPreview>, Error> {
    let csv_data = read_csv_upload(multipart).await?;
    let statement = parse_anz_csv(&csv_data)?;

    if statement.transactions.is_empty() {
        return Err(Error::NoValidTransactions);
    }

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let preview = build_preview(statement, &user_id, &connection)?;

    tracing::info!(
        "ANZ import preview for {user_id}: {} rows, {} new, {} duplicates, {} skipped",
        preview.total,
        preview.new,
        preview.duplicates,
        preview.skipped
    );

    Ok(Json(preview))
}

/// Read the statement from the "file" field of the multipart form.
async fn read_csv_upload(mut multipart: Multipart) -> Result<String, Error> {
    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::error!("Could not read multipart form: {error}");
        Error::MultipartError(error.body_text())
    })? {
        if field.name() == Some(FILE_FIELD) {
            return read_csv_field(field).await;
        }
    }

    Err(Error::NoFile)
}

async fn read_csv_field(field: Field<'_>) -> Result<String, Error> {
    let file_name = match field.file_name() {
        Some(file_name) => file_name.to_owned(),
        None => return Err(Error::NoFile),
    };

    if !file_name.to_lowercase().ends_with(".csv") {
        return Err(Error::NotCSV);
    }

    let data = match field.text().await {
        Ok(data) => data,
        Err(error) => {
            tracing::error!("Could not read data from multipart form field: {error}");
            return Err(Error::MultipartError(
                "Could not read data from multipart form field.".to_owned(),
            ));
        }
    };

    tracing::debug!("Received file '{}' that is {} bytes", file_name, data.len());

    Ok(data)
}

/// Split the statement into new and previously imported transactions and categorize the new
/// ones.
///
/// The fallback categories "Uncategorized" and "Other Income" are created if the user does not
/// have them yet.
///
/// # Errors
/// Returns an [Error::DuplicateCategoryName] if the user has a fallback category name with the
/// wrong type, or an [Error::SqlError] if there is an unexpected SQL error.
pub fn build_preview(
    statement: ParsedStatement,
    user_id: &UserID,
    connection: &Connection,
) -> Result<ImportPreview, Error> {
    let uncategorized = get_or_create_category(
        &CategoryName::new_unchecked(UNCATEGORIZED),
        TransactionType::Expense,
        UNCATEGORIZED_COLOR,
        user_id,
        connection,
    )?;
    let other_income = get_or_create_category(
        &CategoryName::new_unchecked(OTHER_INCOME),
        TransactionType::Income,
        OTHER_INCOME_COLOR,
        user_id,
        connection,
    )?;

    let mut matcher = RuleMatcher::load(user_id, connection)?;
    let total = statement.transactions.len();
    let mut import_data = Vec::new();

    for transaction in statement.transactions {
        if import_id_exists(
            ANZ_IMPORT_SOURCE,
            &transaction.import_id,
            user_id,
            connection,
        )? {
            continue;
        }

        let category_id = matcher
            .categorize(
                &transaction.description,
                transaction.transaction_type,
                connection,
            )
            .unwrap_or(match transaction.transaction_type {
                TransactionType::Expense => uncategorized.id,
                TransactionType::Income => other_income.id,
            });

        import_data.push(ImportItem {
            amount: transaction.amount,
            transaction_type: transaction.transaction_type,
            category_id,
            original_desc: transaction.description.clone(),
            description: transaction.description,
            date: transaction.date,
            import_source: ANZ_IMPORT_SOURCE.to_owned(),
            import_id: transaction.import_id,
        });
    }

    let preview = import_data
        .iter()
        .take(PREVIEW_LENGTH)
        .map(|item| PreviewItem {
            date: item.date,
            amount: item.amount,
            description: item.description.clone(),
            transaction_type: item.transaction_type,
        })
        .collect();

    Ok(ImportPreview {
        total,
        new: import_data.len(),
        duplicates: total - import_data.len(),
        skipped: statement.skipped.len(),
        skipped_rows: statement.skipped,
        preview,
        import_data,
    })
}
