//! SQLite persistence module
//!
//! Schema, row mapping and repositories.

pub mod repos;
pub mod schema;

pub use repos::{
    BalanceRepo, LedgerFilter, LedgerRepo, ReceiptRepo, RequestFilter, RequestRepo,
    StatusLogRepo,
};
pub use schema::{
    create_schema, BalanceRow, LedgerEntryRow, ReceiptRow, RequestRow, StatusLogRow,
};
