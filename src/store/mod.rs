//! Store module - structured local store and query interface

mod guard;
mod sales_store;

pub use guard::{QueryGuard, QueryPolicy};
pub use sales_store::{SalesStore, StoreColumn, StoreError, StoreLocation};
