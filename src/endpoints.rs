//! The API endpoints URIs.
//!
//! Endpoints that take a parameter, e.g., '/api/categories/{category_id}', are filled in with
//! `format_endpoint` in tests.

/// The route for getting the authenticated user.
pub const AUTH_USER: &str = "/api/auth/user";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to list and create categorization rules.
pub const RULES: &str = "/api/rules";
/// The route to access a single categorization rule.
pub const RULE: &str = "/api/rules/{rule_id}";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to list and create budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to access a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";
/// The route to list and create recurring transactions.
pub const RECURRING: &str = "/api/recurring";
/// The route to access a single recurring transaction.
pub const RECURRING_ITEM: &str = "/api/recurring/{recurring_id}";
/// The route that creates the transactions that recurring transactions are due for.
pub const RECURRING_PROCESS: &str = "/api/recurring/process";
/// The route to upload ANZ CSV statements for a preview of the import.
pub const IMPORT_ANZ: &str = "/api/import/anz";
/// The route to save the transactions from an import preview.
pub const IMPORT_CONFIRM: &str = "/api/import/confirm";
/// The route for summary reports.
pub const REPORTS: &str = "/api/reports";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| param_start + offset + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
