//! Route handlers for managing and processing recurring transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, Error, Money, UserID,
    extract::{JsonBody, PathParam},
    recurring::{
        db::{
            NewRecurringTransaction, create_recurring_transaction, delete_recurring_transaction,
            get_all_recurring_transactions, get_recurring_transaction,
            update_recurring_transaction,
        },
        domain::{RecurringData, RecurringTransactionId, RecurringWithCategory},
        process::process_due_transactions,
    },
    timezone::local_today,
};

/// The state needed for managing recurring transactions.
#[derive(Debug, Clone)]
pub struct RecurringState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone that decides which occurrences are due today.
    pub local_timezone: String,
}

impl FromRef<AppState> for RecurringState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// List the caller's recurring transactions, most recently created first.
pub async fn list_recurring_endpoint(
    State(state): State<RecurringState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let recurring = get_all_recurring_transactions(&user_id, &connection)?;

    Ok(Json(json!({ "recurring": recurring })))
}

/// Create a recurring transaction.
pub async fn create_recurring_endpoint(
    State(state): State<RecurringState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<RecurringData>,
) -> Result<(StatusCode, Json<RecurringWithCategory>), Error> {
    let (Some(amount), Some(transaction_type), Some(category_id), Some(frequency), Some(start_date)) = (
        data.amount,
        data.transaction_type,
        data.category_id,
        data.frequency,
        data.start_date,
    ) else {
        return Err(Error::MissingFields);
    };

    let new_recurring = NewRecurringTransaction {
        amount: Money::positive(amount)?,
        transaction_type,
        category_id,
        description: data.description.unwrap_or_default(),
        frequency,
        start_date,
        end_date: data.end_date,
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let recurring = create_recurring_transaction(new_recurring, &user_id, &connection)?;
    let recurring = get_recurring_transaction(recurring.id, &user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(recurring)))
}

/// Get one of the caller's recurring transactions.
pub async fn get_recurring_endpoint(
    State(state): State<RecurringState>,
    Extension(user_id): Extension<UserID>,
    PathParam(recurring_id): PathParam<RecurringTransactionId>,
) -> Result<Json<RecurringWithCategory>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_recurring_transaction(recurring_id, &user_id, &connection).map(Json)
}

/// Update the supplied fields of a recurring transaction, including pausing or resuming it.
pub async fn update_recurring_endpoint(
    State(state): State<RecurringState>,
    Extension(user_id): Extension<UserID>,
    PathParam(recurring_id): PathParam<RecurringTransactionId>,
    JsonBody(data): JsonBody<RecurringData>,
) -> Result<Json<RecurringWithCategory>, Error> {
    let amount = data.amount.map(Money::positive).transpose()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let mut recurring = get_recurring_transaction(recurring_id, &user_id, &connection)?.recurring;

    if let Some(amount) = amount {
        recurring.amount = amount;
    }

    if let Some(transaction_type) = data.transaction_type {
        recurring.transaction_type = transaction_type;
    }

    if let Some(category_id) = data.category_id {
        recurring.category_id = category_id;
    }

    if let Some(description) = data.description {
        recurring.description = description;
    }

    if let Some(frequency) = data.frequency {
        recurring.frequency = frequency;
    }

    if let Some(start_date) = data.start_date {
        recurring.start_date = start_date;
    }

    if let Some(end_date) = data.end_date {
        recurring.end_date = Some(end_date);
    }

    if let Some(is_active) = data.is_active {
        recurring.is_active = is_active;
    }

    update_recurring_transaction(&recurring, &connection)?;

    get_recurring_transaction(recurring_id, &user_id, &connection).map(Json)
}

/// Delete one of the caller's recurring transactions.
pub async fn delete_recurring_endpoint(
    State(state): State<RecurringState>,
    Extension(user_id): Extension<UserID>,
    PathParam(recurring_id): PathParam<RecurringTransactionId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_recurring_transaction(recurring_id, &user_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}

/// Create the transactions for the caller's recurring transactions that are due today.
pub async fn process_recurring_endpoint(
    State(state): State<RecurringState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let processed = process_due_transactions(&user_id, today, &connection)?;

    Ok(Json(json!({
        "success": true,
        "processed": processed,
        "message": format!("Processed {processed} recurring transaction(s)"),
    })))
}

#[cfg(test)]
mod recurring_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{TestClient, get_test_client},
    };

    async fn create_category(client: &TestClient) -> i64 {
        let response = client
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Rent", "type": "EXPENSE", "color": "#FF0000"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let category: Value = response.json();

        category["id"].as_i64().unwrap()
    }

    async fn create_rent(client: &TestClient, start_date: &str) -> Value {
        let category_id = create_category(client).await;
        let response = client
            .post(endpoints::RECURRING)
            .json(&json!({
                "amount": 1500,
                "type": "EXPENSE",
                "categoryId": category_id,
                "description": "Rent",
                "frequency": "MONTHLY",
                "startDate": start_date
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        response.json()
    }

    #[tokio::test]
    async fn create_recurring_returns_created() {
        let client = get_test_client();

        let recurring = create_rent(&client, "2024-01-15").await;

        assert_eq!(recurring["frequency"], "MONTHLY");
        assert_eq!(recurring["isActive"], true);
        assert_eq!(recurring["lastProcessed"], Value::Null);
        assert_eq!(recurring["category"]["name"], "Rent");
    }

    #[tokio::test]
    async fn create_recurring_without_frequency_fails() {
        let client = get_test_client();
        let category_id = create_category(&client).await;

        let response = client
            .post(endpoints::RECURRING)
            .json(&json!({
                "amount": 1500,
                "type": "EXPENSE",
                "categoryId": category_id,
                "startDate": "2024-01-15"
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn process_creates_due_transaction() {
        let client = get_test_client();
        let recurring = create_rent(&client, "2020-01-15").await;

        let response = client.post(endpoints::RECURRING_PROCESS).await;

        response.assert_status_ok();
        response.assert_json(&json!({
            "success": true,
            "processed": 1,
            "message": "Processed 1 recurring transaction(s)"
        }));

        let page: Value = client.get(endpoints::TRANSACTIONS).await.json();
        assert_eq!(page["total"], 1);
        assert_eq!(page["transactions"][0]["date"], "2020-01-15");
        assert_eq!(
            page["transactions"][0]["recurringTransactionId"],
            recurring["id"]
        );
    }

    #[tokio::test]
    async fn paused_recurring_is_not_processed() {
        let client = get_test_client();
        let recurring = create_rent(&client, "2020-01-15").await;
        let path = format_endpoint(endpoints::RECURRING_ITEM, recurring["id"].as_i64().unwrap());

        let updated: Value = client
            .patch(&path)
            .json(&json!({"isActive": false}))
            .await
            .json();
        assert_eq!(updated["isActive"], false);

        let response: Value = client.post(endpoints::RECURRING_PROCESS).await.json();
        assert_eq!(response["processed"], 0);
    }

    #[tokio::test]
    async fn list_and_delete_recurring() {
        let client = get_test_client();
        let recurring = create_rent(&client, "2024-01-15").await;
        let path = format_endpoint(endpoints::RECURRING_ITEM, recurring["id"].as_i64().unwrap());

        let list: Value = client.get(endpoints::RECURRING).await.json();
        assert_eq!(list["recurring"].as_array().unwrap().len(), 1);

        client.delete(&path).await.assert_status_ok();
        client.get(&path).await.assert_status_not_found();
    }
}
