//! Application router configuration.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    AppState, Error,
    auth::auth_guard,
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
        list_budgets_endpoint, update_budget_endpoint,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, get_category_endpoint,
        list_categories_endpoint, update_category_endpoint,
    },
    csv_import::{confirm_import_endpoint, import_anz_endpoint},
    endpoints,
    recurring::{
        create_recurring_endpoint, delete_recurring_endpoint, get_recurring_endpoint,
        list_recurring_endpoint, process_recurring_endpoint, update_recurring_endpoint,
    },
    report::get_report_endpoint,
    rule::{
        create_rule_endpoint, delete_rule_endpoint, get_rule_endpoint, list_rules_endpoint,
        update_rule_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
    user::get_current_user,
};

/// Return a router with all the app's routes.
///
/// Every route requires the identity headers set by the identity proxy.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::AUTH_USER, get(get_current_user))
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .patch(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::RULES,
            get(list_rules_endpoint).post(create_rule_endpoint),
        )
        .route(
            endpoints::RULE,
            get(get_rule_endpoint)
                .patch(update_rule_endpoint)
                .delete(delete_rule_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .patch(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            get(list_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint)
                .patch(update_budget_endpoint)
                .delete(delete_budget_endpoint),
        )
        .route(
            endpoints::RECURRING,
            get(list_recurring_endpoint).post(create_recurring_endpoint),
        )
        .route(endpoints::RECURRING_PROCESS, post(process_recurring_endpoint))
        .route(
            endpoints::RECURRING_ITEM,
            get(get_recurring_endpoint)
                .patch(update_recurring_endpoint)
                .delete(delete_recurring_endpoint),
        )
        .route(endpoints::IMPORT_ANZ, post(import_anz_endpoint))
        .route(endpoints::IMPORT_CONFIRM, post(confirm_import_endpoint))
        .route(endpoints::REPORTS, get(get_report_endpoint))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
