//! Income and expense reports.

mod aggregation;
mod endpoints;

pub use endpoints::get_report_endpoint;
