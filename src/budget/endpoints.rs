//! Route handlers for managing budgets.

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
    budget::{
        db::{NewBudget, create_budget, delete_budget, get_all_budgets, get_budget, update_budget},
        domain::{BudgetData, BudgetId, BudgetWithSpending, DEFAULT_ALERT_THRESHOLD},
    },
    extract::{JsonBody, PathParam},
};

/// The state needed for managing budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the caller's budgets with their current spending.
pub async fn list_budgets_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let budgets = get_all_budgets(&user_id, &connection)?;

    Ok(Json(json!({ "budgets": budgets })))
}

/// Create a budget. The alert threshold defaults to 80%.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<BudgetData>,
) -> Result<(StatusCode, Json<BudgetWithSpending>), Error> {
    let (Some(category_id), Some(amount), Some(period), Some(start_date)) =
        (data.category_id, data.amount, data.period, data.start_date)
    else {
        return Err(Error::MissingFields);
    };

    let new_budget = NewBudget {
        category_id,
        amount: Money::positive(amount)?,
        period,
        start_date,
        end_date: data.end_date,
        alert_threshold: data.alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD),
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let budget = create_budget(new_budget, &user_id, &connection)?;
    let budget = get_budget(budget.id, &user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(budget)))
}

/// Get one of the caller's budgets with its current spending.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    PathParam(budget_id): PathParam<BudgetId>,
) -> Result<Json<BudgetWithSpending>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_budget(budget_id, &user_id, &connection).map(Json)
}

/// Update the supplied fields of one of the caller's budgets.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    PathParam(budget_id): PathParam<BudgetId>,
    JsonBody(data): JsonBody<BudgetData>,
) -> Result<Json<BudgetWithSpending>, Error> {
    let amount = data.amount.map(Money::positive).transpose()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let mut budget = get_budget(budget_id, &user_id, &connection)?.budget;

    if let Some(category_id) = data.category_id {
        budget.category_id = category_id;
    }

    if let Some(amount) = amount {
        budget.amount = amount;
    }

    if let Some(period) = data.period {
        budget.period = period;
    }

    if let Some(start_date) = data.start_date {
        budget.start_date = start_date;
    }

    if let Some(end_date) = data.end_date {
        budget.end_date = Some(end_date);
    }

    if let Some(alert_threshold) = data.alert_threshold {
        budget.alert_threshold = alert_threshold;
    }

    update_budget(&budget, &connection)?;

    get_budget(budget_id, &user_id, &connection).map(Json)
}

/// Delete one of the caller's budgets.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    PathParam(budget_id): PathParam<BudgetId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_budget(budget_id, &user_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}
