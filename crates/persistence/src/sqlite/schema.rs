//! Database schema definitions
//!
//! DDL for the fund tables and row types for sqlx mapping.
//! Decimals are stored as TEXT to keep exact precision.

use crate::error::{PersistenceError, PersistenceResult};
use aidfund_core::{
    AidRequest, Amount, Direction, FundBalance, LedgerEntry, Receipt, ReceiptStatus,
    RequestState, ReviewTrack, StatusLogEntry,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Schema statements, applied in order. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS aid_requests (
        id TEXT PRIMARY KEY,
        requester_id TEXT NOT NULL,
        category_id TEXT NOT NULL,
        track TEXT NOT NULL CHECK (track IN ('fast_track', 'board')),
        requested_amount TEXT NOT NULL,
        board_amount TEXT,
        approved_amount TEXT,
        state TEXT NOT NULL
            CHECK (state IN ('submitted', 'board_reviewed', 'approved', 'rejected')),
        justification TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_aid_requests_state ON aid_requests(state)",
    r#"
    CREATE TABLE IF NOT EXISTS status_log (
        request_id TEXT NOT NULL,
        sequence INTEGER NOT NULL,
        previous_state TEXT NOT NULL,
        new_state TEXT NOT NULL,
        actor_id TEXT NOT NULL,
        remark TEXT,
        created_at TEXT NOT NULL,
        PRIMARY KEY (request_id, sequence),
        FOREIGN KEY (request_id) REFERENCES aid_requests(id)
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS status_log_no_update
    BEFORE UPDATE ON status_log
    BEGIN
        SELECT RAISE(ABORT, 'status log entries are immutable');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS status_log_no_delete
    BEFORE DELETE ON status_log
    BEGIN
        SELECT RAISE(ABORT, 'status log entries are immutable');
    END
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS receipts (
        id TEXT PRIMARY KEY,
        request_id TEXT NOT NULL,
        uploader_id TEXT NOT NULL,
        locator TEXT NOT NULL,
        declared_amount TEXT,
        status TEXT NOT NULL CHECK (status IN ('active', 'void')),
        uploaded_at TEXT NOT NULL,
        FOREIGN KEY (request_id) REFERENCES aid_requests(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_receipts_request ON receipts(request_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        direction TEXT NOT NULL CHECK (direction IN ('inflow', 'outflow')),
        amount TEXT NOT NULL,
        category TEXT NOT NULL,
        request_id TEXT,
        actor_id TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        balance_after TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (request_id) REFERENCES aid_requests(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ledger_entries_request ON ledger_entries(request_id)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_entries_created ON ledger_entries(created_at)",
    // At most one disbursement outflow per request
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_entries_request_outflow
    ON ledger_entries(request_id)
    WHERE request_id IS NOT NULL AND direction = 'outflow'
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS ledger_entries_financial_immutable
    BEFORE UPDATE OF direction, amount, category, request_id ON ledger_entries
    BEGIN
        SELECT RAISE(ABORT, 'ledger entry financial fields are immutable');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS ledger_entries_no_delete
    BEFORE DELETE ON ledger_entries
    BEGIN
        SELECT RAISE(ABORT, 'ledger entries are append-only');
    END
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fund_balance (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        current_balance TEXT NOT NULL,
        last_entry_seq INTEGER NOT NULL,
        revision INTEGER NOT NULL,
        recomputed_at TEXT NOT NULL,
        recomputed_by TEXT NOT NULL
    )
    "#,
];

/// Create all tables, indexes and triggers.
pub async fn create_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn parse_enum<T: FromStr>(field: &str, value: &str) -> PersistenceResult<T> {
    T::from_str(value)
        .map_err(|_| PersistenceError::InvalidValue(format!("{} = {}", field, value)))
}

fn parse_amount(value: &str) -> PersistenceResult<Amount> {
    Ok(Amount::from_str(value)?)
}

fn parse_decimal(value: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(value).map_err(|e| PersistenceError::InvalidValue(e.to_string()))
}

/// Row type for `aid_requests`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RequestRow {
    pub id: String,
    pub requester_id: String,
    pub category_id: String,
    pub track: String,
    pub requested_amount: String,
    pub board_amount: Option<String>,
    pub approved_amount: Option<String>,
    pub state: String,
    pub justification: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for `status_log`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct StatusLogRow {
    pub request_id: String,
    pub sequence: i64,
    pub previous_state: String,
    pub new_state: String,
    pub actor_id: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type for `receipts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub id: String,
    pub request_id: String,
    pub uploader_id: String,
    pub locator: String,
    pub declared_amount: Option<String>,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Row type for `ledger_entries`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LedgerEntryRow {
    pub seq: i64,
    pub id: String,
    pub direction: String,
    pub amount: String,
    pub category: String,
    pub request_id: Option<String>,
    pub actor_id: String,
    pub description: String,
    pub balance_after: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type for `fund_balance`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct BalanceRow {
    pub id: i64,
    pub current_balance: String,
    pub last_entry_seq: i64,
    pub revision: i64,
    pub recomputed_at: DateTime<Utc>,
    pub recomputed_by: String,
}

// === Conversion implementations ===

impl TryFrom<RequestRow> for AidRequest {
    type Error = PersistenceError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            track: parse_enum::<ReviewTrack>("track", &row.track)?,
            requested_amount: parse_amount(&row.requested_amount)?,
            board_amount: row.board_amount.as_deref().map(parse_amount).transpose()?,
            approved_amount: row.approved_amount.as_deref().map(parse_amount).transpose()?,
            state: parse_enum::<RequestState>("state", &row.state)?,
            id: row.id,
            requester_id: row.requester_id,
            category_id: row.category_id,
            justification: row.justification,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<StatusLogRow> for StatusLogEntry {
    type Error = PersistenceError;

    fn try_from(row: StatusLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            previous_state: parse_enum::<RequestState>("previous_state", &row.previous_state)?,
            new_state: parse_enum::<RequestState>("new_state", &row.new_state)?,
            request_id: row.request_id,
            sequence: row.sequence,
            actor_id: row.actor_id,
            remark: row.remark,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = PersistenceError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        let status = ReceiptStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::InvalidValue(format!("status = {}", row.status)))?;
        Ok(Self {
            declared_amount: row.declared_amount.as_deref().map(parse_amount).transpose()?,
            status,
            id: row.id,
            request_id: row.request_id,
            uploader_id: row.uploader_id,
            locator: row.locator,
            uploaded_at: row.uploaded_at,
        })
    }
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = PersistenceError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            direction: parse_enum::<Direction>("direction", &row.direction)?,
            amount: parse_amount(&row.amount)?,
            balance_after: row.balance_after.as_deref().map(parse_decimal).transpose()?,
            seq: row.seq,
            id: row.id,
            category: row.category,
            request_id: row.request_id,
            actor_id: row.actor_id,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<BalanceRow> for FundBalance {
    type Error = PersistenceError;

    fn try_from(row: BalanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            current_balance: parse_decimal(&row.current_balance)?,
            last_entry_seq: row.last_entry_seq,
            revision: row.revision,
            recomputed_at: row.recomputed_at,
            recomputed_by: row.recomputed_by,
        })
    }
}
