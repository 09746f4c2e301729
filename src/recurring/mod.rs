//! Transactions that repeat on a schedule, and the processing that turns them into transactions.

mod db;
mod domain;
mod endpoints;
mod process;

pub use db::create_recurring_transaction_table;
pub use endpoints::{
    create_recurring_endpoint, delete_recurring_endpoint, get_recurring_endpoint,
    list_recurring_endpoint, process_recurring_endpoint, update_recurring_endpoint,
};
