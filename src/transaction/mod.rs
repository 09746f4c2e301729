//! Transaction management.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, importing, querying, and managing transactions
//! - Route handlers for the transaction endpoints

mod core;
mod endpoints;
mod query;

pub use core::{
    ImportProvenance, Transaction, TransactionBuilder, TransactionWithCategory,
    create_transaction, create_transaction_table, import_id_exists, import_transactions,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    list_transactions_endpoint, update_transaction_endpoint,
};
pub use query::get_transactions_in_range;
#[cfg(test)]
pub use query::{TransactionQuery, query_transactions};
