//! Rules that automatically categorize imported transactions.

mod db;
mod endpoints;
mod matcher;
mod models;
mod state;

pub use db::create_rule_table;
#[cfg(test)]
pub use db::{create_rule, get_all_rules, get_rule};
pub use endpoints::{
    create_rule_endpoint, delete_rule_endpoint, get_rule_endpoint, list_rules_endpoint,
    update_rule_endpoint,
};
pub use matcher::RuleMatcher;
