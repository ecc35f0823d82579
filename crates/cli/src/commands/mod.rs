//! Command handlers

pub mod admin;
pub mod ledger;
pub mod request;
pub mod session;
