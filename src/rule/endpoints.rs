//! Route handlers for managing categorization rules.

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::{
    Error, UserID,
    extract::{JsonBody, PathParam},
    rule::{
        db::{create_rule, delete_rule, get_all_rules, get_rule, update_rule},
        models::{RuleData, RuleId, RuleWithCategory},
        state::RuleState,
    },
};

/// List the caller's rules in the order they are tried.
pub async fn list_rules_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let rules = get_all_rules(&user_id, &connection)?;

    Ok(Json(json!({ "rules": rules })))
}

/// Create a rule. The confidence defaults to zero.
pub async fn create_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<RuleData>,
) -> Result<(StatusCode, Json<RuleWithCategory>), Error> {
    let (Some(pattern), Some(category_id)) = (data.pattern, data.category_id) else {
        return Err(Error::MissingFields);
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let rule = create_rule(
        &pattern,
        category_id,
        data.confidence.unwrap_or_default(),
        &user_id,
        &connection,
    )?;
    let rule = get_rule(rule.id, &user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(rule)))
}

/// Get one of the caller's rules.
pub async fn get_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    PathParam(rule_id): PathParam<RuleId>,
) -> Result<Json<RuleWithCategory>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_rule(rule_id, &user_id, &connection).map(Json)
}

/// Change a rule's pattern, category or confidence.
pub async fn update_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    PathParam(rule_id): PathParam<RuleId>,
    JsonBody(data): JsonBody<RuleData>,
) -> Result<Json<RuleWithCategory>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let mut rule = get_rule(rule_id, &user_id, &connection)?.rule;

    if let Some(pattern) = data.pattern {
        rule.pattern = pattern;
    }

    if let Some(category_id) = data.category_id {
        rule.category_id = category_id;
    }

    if let Some(confidence) = data.confidence {
        rule.confidence = confidence;
    }

    update_rule(&rule, &connection)?;

    get_rule(rule_id, &user_id, &connection).map(Json)
}

/// Delete one of the caller's rules.
pub async fn delete_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    PathParam(rule_id): PathParam<RuleId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_rule(rule_id, &user_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}
