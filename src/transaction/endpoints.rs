//! Route handlers for creating, reading, updating and deleting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};
use time::Date;

use crate::{
    AppState, Error, Money, TransactionType, UserID,
    category::CategoryId,
    extract::{JsonBody, PathParam, QueryParams},
    transaction::{
        core::{
            Transaction, TransactionId, TransactionWithCategory, create_transaction,
            delete_transaction, get_transaction, update_transaction,
        },
        query::{TransactionPage, TransactionQuery, query_transactions},
    },
};

/// The state needed for managing transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The fields of a transaction sent by the client.
///
/// All fields are required when creating a transaction except for the description. When
/// updating a transaction, only the fields that are present are changed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
    #[serde(default, with = "crate::date::iso_date::option")]
    pub date: Option<Date>,
}

/// List the caller's transactions, newest first, filtered by the query string.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    QueryParams(query): QueryParams<TransactionQuery>,
) -> Result<Json<TransactionPage>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    query_transactions(&query, &user_id, &connection).map(Json)
}

/// Record a new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<TransactionData>,
) -> Result<(StatusCode, Json<TransactionWithCategory>), Error> {
    let (Some(amount), Some(transaction_type), Some(category_id), Some(date)) = (
        data.amount,
        data.transaction_type,
        data.category_id,
        data.date,
    ) else {
        return Err(Error::MissingFields);
    };

    let amount = Money::positive(amount)?;
    let description = data.description.unwrap_or_default();

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = create_transaction(
        Transaction::build(amount, transaction_type, date, &description, category_id),
        &user_id,
        &connection,
    )?;
    let transaction = get_transaction(transaction.id, &user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Get one of the caller's transactions with its category.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    PathParam(transaction_id): PathParam<TransactionId>,
) -> Result<Json<TransactionWithCategory>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_transaction(transaction_id, &user_id, &connection).map(Json)
}

/// Update the supplied fields of one of the caller's transactions.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    PathParam(transaction_id): PathParam<TransactionId>,
    JsonBody(data): JsonBody<TransactionData>,
) -> Result<Json<TransactionWithCategory>, Error> {
    let amount = data.amount.map(Money::positive).transpose()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let mut transaction = get_transaction(transaction_id, &user_id, &connection)?.transaction;

    if let Some(amount) = amount {
        transaction.amount = amount;
    }

    if let Some(transaction_type) = data.transaction_type {
        transaction.transaction_type = transaction_type;
    }

    if let Some(category_id) = data.category_id {
        transaction.category_id = category_id;
    }

    if let Some(description) = data.description {
        transaction.description = description;
    }

    if let Some(date) = data.date {
        transaction.date = date;
    }

    update_transaction(&transaction, &connection)?;

    get_transaction(transaction_id, &user_id, &connection).map(Json)
}

/// Delete one of the caller's transactions.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    PathParam(transaction_id): PathParam<TransactionId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(transaction_id, &user_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod transaction_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{TestClient, get_test_client},
    };

    async fn create_category(client: &TestClient, name: &str, category_type: &str) -> i64 {
        let response = client
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": name, "type": category_type, "color": "#123456"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let category: Value = response.json();

        category["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn create_transaction_returns_created() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;

        let response = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 12.5,
                "type": "EXPENSE",
                "categoryId": category_id,
                "description": "Groceries",
                "date": "2025-03-01"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let transaction: Value = response.json();
        assert_eq!(transaction["amount"], 12.5);
        assert_eq!(transaction["type"], "EXPENSE");
        assert_eq!(transaction["date"], "2025-03-01");
        assert_eq!(transaction["description"], "Groceries");
        assert_eq!(transaction["category"]["name"], "Food");
    }

    #[tokio::test]
    async fn create_transaction_accepts_timestamp_dates() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;

        let response = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 3,
                "type": "EXPENSE",
                "categoryId": category_id,
                "date": "2025-03-01T10:30:00Z"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let transaction: Value = response.json();
        assert_eq!(transaction["date"], "2025-03-01");
        assert_eq!(transaction["description"], "");
    }

    #[tokio::test]
    async fn create_transaction_without_category_fails() {
        let client = get_test_client();

        let response = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({"amount": 12.5, "type": "EXPENSE", "date": "2025-03-01"}))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({"error": "Missing required fields"}));
    }

    #[tokio::test]
    async fn create_transaction_with_negative_amount_fails() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;

        let response = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": -1,
                "type": "EXPENSE",
                "categoryId": category_id,
                "date": "2025-03-01"
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn create_transaction_with_huge_amount_fails() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;

        let response = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 1e27,
                "type": "EXPENSE",
                "categoryId": category_id,
                "date": "2025-03-01"
            }))
            .await;

        response.assert_status_bad_request();
        client.get(endpoints::TRANSACTIONS).await.assert_status_ok();
        client.get(endpoints::REPORTS).await.assert_status_ok();
    }

    #[tokio::test]
    async fn list_transactions_filters_and_counts() {
        let client = get_test_client();
        let food = create_category(&client, "Food", "EXPENSE").await;
        let salary = create_category(&client, "Salary", "INCOME").await;

        for (amount, transaction_type, category_id, date) in [
            (10, "EXPENSE", food, "2025-01-01"),
            (20, "EXPENSE", food, "2025-02-01"),
            (1000, "INCOME", salary, "2025-02-15"),
        ] {
            client
                .post(endpoints::TRANSACTIONS)
                .json(&json!({
                    "amount": amount,
                    "type": transaction_type,
                    "categoryId": category_id,
                    "date": date
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = client
            .get(&format!("{}?type=EXPENSE&limit=1", endpoints::TRANSACTIONS))
            .await;

        response.assert_status_ok();
        let page: Value = response.json();
        assert_eq!(page["total"], 2);
        assert_eq!(page["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(page["transactions"][0]["date"], "2025-02-01");
    }

    #[tokio::test]
    async fn list_transactions_with_bad_date_fails() {
        let client = get_test_client();

        let response = client
            .get(&format!("{}?startDate=yesterday", endpoints::TRANSACTIONS))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn patch_updates_only_supplied_fields() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;
        let transaction: Value = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 12.5,
                "type": "EXPENSE",
                "categoryId": category_id,
                "description": "Groceries",
                "date": "2025-03-01"
            }))
            .await
            .json();
        let path = format_endpoint(endpoints::TRANSACTION, transaction["id"].as_i64().unwrap());

        let response = client
            .patch(&path)
            .json(&json!({"description": "Supermarket"}))
            .await;

        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["description"], "Supermarket");
        assert_eq!(updated["amount"], 12.5);
        assert_eq!(updated["date"], "2025-03-01");
    }

    #[tokio::test]
    async fn other_users_cannot_see_transaction() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;
        let transaction: Value = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 12.5,
                "type": "EXPENSE",
                "categoryId": category_id,
                "date": "2025-03-01"
            }))
            .await
            .json();
        let path = format_endpoint(endpoints::TRANSACTION, transaction["id"].as_i64().unwrap());

        client.get_as_other_user(&path).await.assert_status_not_found();
        client.get(&path).await.assert_status_ok();
    }

    #[tokio::test]
    async fn delete_transaction_succeeds() {
        let client = get_test_client();
        let category_id = create_category(&client, "Food", "EXPENSE").await;
        let transaction: Value = client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 12.5,
                "type": "EXPENSE",
                "categoryId": category_id,
                "date": "2025-03-01"
            }))
            .await
            .json();
        let path = format_endpoint(endpoints::TRANSACTION, transaction["id"].as_i64().unwrap());

        let response = client.delete(&path).await;

        response.assert_status_ok();
        response.assert_json(&json!({"success": true}));
        client.get(&path).await.assert_status_not_found();
    }
}
