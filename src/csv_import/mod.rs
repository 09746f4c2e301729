//! Importing transactions from bank statements.
//!
//! Importing is a two step process: the statement is uploaded and parsed into a preview, then
//! the client sends back the transactions it wants to keep.

mod anz;
mod confirm;
mod preview;

pub use confirm::confirm_import_endpoint;
pub use preview::import_anz_endpoint;
