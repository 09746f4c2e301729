//! Pennywise is a web app for tracking personal finances.
//!
//! This library provides a JSON API for recording transactions, organising them into
//! categories, tracking budgets and recurring transactions, importing bank statements and
//! producing summary reports. Authentication is handled by an upstream identity proxy that
//! forwards the caller's identity in request headers.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod budget;
mod category;
mod csv_import;
mod database_id;
mod date;
mod db;
mod endpoints;
mod extract;
mod logging;
mod money;
mod recurring;
mod report;
mod routing;
mod rule;
mod timezone;
mod transaction;
mod transaction_type;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, MAX_REQUEST_BODY_BYTES, logging_middleware};
pub use money::Money;
pub use routing::build_router;
pub use timezone::get_local_offset;
pub use transaction_type::TransactionType;
pub use user::{User, UserID};

use crate::category::CategoryId;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request did not carry the identity headers set by the identity proxy.
    #[error("Unauthorized")]
    Unauthorized,

    /// One or more required fields were missing from the request body.
    #[error("Missing required fields")]
    MissingFields,

    /// The request could not be parsed, e.g. malformed JSON or an invalid query string.
    ///
    /// Callers should pass in the rejection text produced by the extractor.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request body is larger than [MAX_REQUEST_BODY_BYTES].
    #[error("Request body is larger than {} bytes", MAX_REQUEST_BODY_BYTES)]
    RequestTooLarge,

    /// A monetary amount was zero, negative or could not be parsed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Adding up or comparing amounts went outside of the range that can be represented.
    #[error("Amount overflow: the amounts are too large to {0}")]
    AmountOverflow(&'static str),

    /// A date string could not be parsed as a calendar date.
    #[error("Invalid date: \"{0}\"")]
    InvalidDate(String),

    /// An invalid combination of dates, e.g. an end date before the start date.
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// The category ID does not refer to a category owned by the caller.
    #[error("the category ID {0} does not refer to one of your categories")]
    InvalidCategory(CategoryId),

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used as the pattern of a categorization rule.
    #[error("Rule pattern cannot be empty")]
    EmptyPattern,

    /// The alert threshold of a budget was outside of the range 0-100.
    #[error("Alert threshold must be between 0 and 100, got {0}")]
    InvalidAlertThreshold(i64),

    /// The user already has a category with this name.
    #[error("Category name \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// The user already has a budget for this category, period and start date.
    #[error("Budget already exists for this category and period")]
    DuplicateBudget,

    /// Tried to delete a category that transactions or recurring transactions still refer to.
    #[error("Category is still used by transactions or recurring transactions")]
    CategoryInUse,

    /// The multipart form did not contain a file.
    #[error("No file provided")]
    NoFile,

    /// The uploaded file does not have a `.csv` extension.
    #[error("File must be a CSV")]
    NotCSV,

    /// The multipart form could not be parsed.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// The uploaded CSV file contained no lines.
    #[error("CSV file is empty")]
    EmptyCSV,

    /// No line of the uploaded CSV file could be turned into a transaction.
    #[error("No valid transactions found in CSV")]
    NoValidTransactions,

    /// The import confirmation did not contain any transactions.
    #[error("No transactions to import")]
    NoTransactionsToImport,

    /// A transaction in the import confirmation was missing a required field.
    #[error("Invalid transaction data")]
    InvalidTransactionData,

    /// The requested resource was not found.
    ///
    /// Records owned by other users are reported as not found so that their existence is not
    /// leaked to the caller.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The configured timezone is not a valid, canonical timezone name.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::MissingFields
            | Error::InvalidRequest(_)
            | Error::InvalidAmount(_)
            | Error::AmountOverflow(_)
            | Error::InvalidDate(_)
            | Error::InvalidDateRange(_)
            | Error::InvalidCategory(_)
            | Error::EmptyCategoryName
            | Error::EmptyPattern
            | Error::InvalidAlertThreshold(_)
            | Error::NoFile
            | Error::NotCSV
            | Error::MultipartError(_)
            | Error::EmptyCSV
            | Error::NoValidTransactions
            | Error::NoTransactionsToImport
            | Error::InvalidTransactionData => StatusCode::BAD_REQUEST,
            Error::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateCategoryName(_) | Error::DuplicateBudget | Error::CategoryInUse => {
                StatusCode::CONFLICT
            }
            Error::SqlError(_) | Error::DatabaseLockError | Error::InvalidTimezone(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal errors are not intended to be shown to the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
