//! Spending caps on categories and the spending measured against them.

mod db;
mod domain;
mod endpoints;

pub use db::create_budget_table;
pub use endpoints::{
    create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint, list_budgets_endpoint,
    update_budget_endpoint,
};
