//! Category management for grouping transactions.

mod db;
mod domain;
mod endpoints;

pub use db::{
    create_category, create_category_table, delete_category, get_all_categories, get_category,
    get_or_create_category, require_category, update_category,
};
pub(crate) use db::map_category_row_with_offset;
pub use domain::{Category, CategoryData, CategoryId, CategoryName};
pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, get_category_endpoint,
    list_categories_endpoint, update_category_endpoint,
};
