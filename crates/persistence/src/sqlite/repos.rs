//! Repository implementations for SQLite
//!
//! Every function takes a connection so callers choose whether it runs
//! inside a transaction (`&mut tx`) or on a pooled connection.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use aidfund_core::{
    AidRequest, Amount, Direction, FundBalance, LedgerEntry, NewLedgerEntry, Receipt,
    ReceiptStatus, RequestState, StatusLogEntry,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

// ============================================================================
// Aid Request Repository
// ============================================================================

/// Filter for listing requests
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub state: Option<RequestState>,
    pub requester_id: Option<String>,
    pub category_id: Option<String>,
    pub include_inactive: bool,
    pub limit: Option<i64>,
}

/// Repository for the aid_requests table
pub struct RequestRepo;

impl RequestRepo {
    pub async fn insert(conn: &mut SqliteConnection, request: &AidRequest) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO aid_requests (
                id, requester_id, category_id, track, requested_amount, board_amount,
                approved_amount, state, justification, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(&request.requester_id)
        .bind(&request.category_id)
        .bind(request.track.as_ref())
        .bind(request.requested_amount.to_string())
        .bind(request.board_amount.map(|a| a.to_string()))
        .bind(request.approved_amount.map(|a| a.to_string()))
        .bind(request.state.as_ref())
        .bind(&request.justification)
        .bind(request.is_active)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<AidRequest>> {
        sqlx::query_as::<_, RequestRow>("SELECT * FROM aid_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(AidRequest::try_from)
            .transpose()
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<AidRequest> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("AidRequest", id))
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &RequestFilter,
    ) -> PersistenceResult<Vec<AidRequest>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM aid_requests WHERE 1 = 1");

        if !filter.include_inactive {
            query.push(" AND is_active = 1");
        }
        if let Some(state) = filter.state {
            query.push(" AND state = ").push_bind(state.as_ref().to_string());
        }
        if let Some(ref requester) = filter.requester_id {
            query.push(" AND requester_id = ").push_bind(requester.clone());
        }
        if let Some(ref category) = filter.category_id {
            query.push(" AND category_id = ").push_bind(category.clone());
        }
        query.push(" ORDER BY created_at DESC, id");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query
            .build_query_as::<RequestRow>()
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(AidRequest::try_from).collect()
    }

    /// Compare-and-set state transition.
    ///
    /// Applies only while the row is active and still in `from`. Returns
    /// `false` when another decision got there first.
    pub async fn transition(
        conn: &mut SqliteConnection,
        id: &str,
        from: RequestState,
        to: RequestState,
        board_amount: Option<Amount>,
        approved_amount: Option<Amount>,
        now: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE aid_requests
            SET state = ?,
                board_amount = COALESCE(?, board_amount),
                approved_amount = COALESCE(?, approved_amount),
                updated_at = ?
            WHERE id = ? AND state = ? AND is_active = 1
            "#,
        )
        .bind(to.as_ref())
        .bind(board_amount.map(|a| a.to_string()))
        .bind(approved_amount.map(|a| a.to_string()))
        .bind(now)
        .bind(id)
        .bind(from.as_ref())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Soft-delete. Returns `false` if the request was already inactive.
    pub async fn deactivate(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            "UPDATE aid_requests SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Take the database write lock for `id` inside an open transaction,
    /// so reads that follow cannot go stale before commit.
    /// Returns `false` if no such request exists.
    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<bool> {
        let result = sqlx::query("UPDATE aid_requests SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Number of active requests per state
    pub async fn count_by_state(
        conn: &mut SqliteConnection,
    ) -> PersistenceResult<Vec<(RequestState, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM aid_requests WHERE is_active = 1 GROUP BY state ORDER BY state",
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|(state, count)| {
                state
                    .parse::<RequestState>()
                    .map(|s| (s, count))
                    .map_err(|_| PersistenceError::InvalidValue(format!("state = {}", state)))
            })
            .collect()
    }
}

// ============================================================================
// Status Log Repository
// ============================================================================

/// Repository for the append-only status_log table
pub struct StatusLogRepo;

impl StatusLogRepo {
    /// Append a transition record with the next per-request sequence number.
    pub async fn append(
        conn: &mut SqliteConnection,
        request_id: &str,
        previous_state: RequestState,
        new_state: RequestState,
        actor_id: &str,
        remark: Option<&str>,
        now: DateTime<Utc>,
    ) -> PersistenceResult<StatusLogEntry> {
        let (sequence,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM status_log WHERE request_id = ?",
        )
        .bind(request_id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO status_log (
                request_id, sequence, previous_state, new_state, actor_id, remark, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request_id)
        .bind(sequence)
        .bind(previous_state.as_ref())
        .bind(new_state.as_ref())
        .bind(actor_id)
        .bind(remark)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(StatusLogEntry {
            request_id: request_id.to_string(),
            sequence,
            previous_state,
            new_state,
            actor_id: actor_id.to_string(),
            remark: remark.map(str::to_string),
            created_at: now,
        })
    }

    pub async fn list_for_request(
        conn: &mut SqliteConnection,
        request_id: &str,
    ) -> PersistenceResult<Vec<StatusLogEntry>> {
        let rows = sqlx::query_as::<_, StatusLogRow>(
            "SELECT * FROM status_log WHERE request_id = ? ORDER BY sequence",
        )
        .bind(request_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(StatusLogEntry::try_from).collect()
    }

    pub async fn count_for_request(
        conn: &mut SqliteConnection,
        request_id: &str,
    ) -> PersistenceResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM status_log WHERE request_id = ?")
                .bind(request_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count)
    }
}

// ============================================================================
// Receipt Repository
// ============================================================================

/// Repository for the receipts table
pub struct ReceiptRepo;

impl ReceiptRepo {
    pub async fn insert(conn: &mut SqliteConnection, receipt: &Receipt) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, request_id, uploader_id, locator, declared_amount, status, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.request_id)
        .bind(&receipt.uploader_id)
        .bind(&receipt.locator)
        .bind(receipt.declared_amount.map(|a| a.to_string()))
        .bind(receipt.status.as_str())
        .bind(receipt.uploaded_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Receipt> {
        sqlx::query_as::<_, ReceiptRow>("SELECT * FROM receipts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Receipt", id))
            .and_then(Receipt::try_from)
    }

    pub async fn list_for_request(
        conn: &mut SqliteConnection,
        request_id: &str,
    ) -> PersistenceResult<Vec<Receipt>> {
        let rows = sqlx::query_as::<_, ReceiptRow>(
            "SELECT * FROM receipts WHERE request_id = ? ORDER BY uploaded_at, id",
        )
        .bind(request_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(Receipt::try_from).collect()
    }

    pub async fn has_active(conn: &mut SqliteConnection, request_id: &str) -> PersistenceResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM receipts WHERE request_id = ? AND status = ?",
        )
        .bind(request_id)
        .bind(ReceiptStatus::Active.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    /// True if `receipt_id` is an active receipt attached to `request_id`.
    pub async fn is_active_for(
        conn: &mut SqliteConnection,
        request_id: &str,
        receipt_id: &str,
    ) -> PersistenceResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM receipts WHERE id = ? AND request_id = ? AND status = ?",
        )
        .bind(receipt_id)
        .bind(request_id)
        .bind(ReceiptStatus::Active.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    /// Mark a receipt void. Returns `false` if it was already void.
    pub async fn void(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<bool> {
        let result = sqlx::query("UPDATE receipts SET status = ? WHERE id = ? AND status = ?")
            .bind(ReceiptStatus::Void.as_str())
            .bind(id)
            .bind(ReceiptStatus::Active.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Ledger Repository
// ============================================================================

/// Filter for listing ledger entries
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub direction: Option<Direction>,
    pub category: Option<String>,
    pub request_id: Option<String>,
    pub limit: Option<i64>,
}

/// Repository for the append-only ledger_entries table
pub struct LedgerRepo;

impl LedgerRepo {
    /// Append an entry. The store assigns `seq` and `created_at`.
    pub async fn append(
        conn: &mut SqliteConnection,
        entry: &NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> PersistenceResult<LedgerEntry> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, direction, amount, category, request_id, actor_id, description, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.direction.as_ref())
        .bind(entry.amount.to_string())
        .bind(&entry.category)
        .bind(&entry.request_id)
        .bind(&entry.actor_id)
        .bind(&entry.description)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(LedgerEntry {
            seq: result.last_insert_rowid(),
            id: entry.id.clone(),
            direction: entry.direction,
            amount: entry.amount,
            category: entry.category.clone(),
            request_id: entry.request_id.clone(),
            actor_id: entry.actor_id.clone(),
            description: entry.description.clone(),
            balance_after: None,
            created_at: now,
        })
    }

    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntryRow>("SELECT * FROM ledger_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<LedgerEntry> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("LedgerEntry", id))
    }

    /// The disbursement outflow tied to a request, if one exists.
    pub async fn outflow_for_request(
        conn: &mut SqliteConnection,
        request_id: &str,
    ) -> PersistenceResult<Option<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries WHERE request_id = ? AND direction = ?",
        )
        .bind(request_id)
        .bind(Direction::Outflow.as_ref())
        .fetch_optional(&mut *conn)
        .await?
        .map(LedgerEntry::try_from)
        .transpose()
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &LedgerFilter,
    ) -> PersistenceResult<Vec<LedgerEntry>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM ledger_entries WHERE 1 = 1");

        if let Some(direction) = filter.direction {
            query
                .push(" AND direction = ")
                .push_bind(direction.as_ref().to_string());
        }
        if let Some(ref category) = filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(ref request_id) = filter.request_id {
            query.push(" AND request_id = ").push_bind(request_id.clone());
        }
        query.push(" ORDER BY seq");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query
            .build_query_as::<LedgerEntryRow>()
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Entries with `seq > after`, in creation order.
    pub async fn entries_after(
        conn: &mut SqliteConnection,
        after: i64,
    ) -> PersistenceResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries WHERE seq > ? ORDER BY seq",
        )
        .bind(after)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Highest assigned sequence, 0 for an empty ledger.
    pub async fn max_seq(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let (seq,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(seq), 0) FROM ledger_entries")
            .fetch_one(&mut *conn)
            .await?;
        Ok(seq)
    }

    /// Record the advisory running balance for an entry.
    pub async fn set_balance_after(
        conn: &mut SqliteConnection,
        seq: i64,
        balance: Decimal,
    ) -> PersistenceResult<()> {
        sqlx::query("UPDATE ledger_entries SET balance_after = ? WHERE seq = ?")
            .bind(balance.to_string())
            .bind(seq)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Edit the free-text description. Financial fields are guarded by a trigger.
    pub async fn update_description(
        conn: &mut SqliteConnection,
        id: &str,
        description: &str,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE ledger_entries SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("LedgerEntry", id));
        }
        Ok(())
    }
}

// ============================================================================
// Fund Balance Repository
// ============================================================================

/// Repository for the single-row fund_balance table
pub struct BalanceRepo;

impl BalanceRepo {
    /// Take the balance row for update.
    ///
    /// The upsert is a write, so inside a transaction it acquires SQLite's
    /// write lock and holds it until commit. Bumps `revision` and returns the
    /// row as it now stands.
    pub async fn lock(
        conn: &mut SqliteConnection,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> PersistenceResult<FundBalance> {
        sqlx::query(
            r#"
            INSERT INTO fund_balance (
                id, current_balance, last_entry_seq, revision, recomputed_at, recomputed_by
            ) VALUES (1, '0', 0, 1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET revision = revision + 1
            "#,
        )
        .bind(now)
        .bind(actor_id)
        .execute(&mut *conn)
        .await?;

        Self::get(conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("FundBalance", "1"))
    }

    pub async fn get(conn: &mut SqliteConnection) -> PersistenceResult<Option<FundBalance>> {
        sqlx::query_as::<_, BalanceRow>("SELECT * FROM fund_balance WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?
            .map(FundBalance::try_from)
            .transpose()
    }

    pub async fn save(conn: &mut SqliteConnection, balance: &FundBalance) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            UPDATE fund_balance
            SET current_balance = ?, last_entry_seq = ?, revision = ?,
                recomputed_at = ?, recomputed_by = ?
            WHERE id = 1
            "#,
        )
        .bind(balance.current_balance.to_string())
        .bind(balance.last_entry_seq)
        .bind(balance.revision)
        .bind(balance.recomputed_at)
        .bind(&balance.recomputed_by)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
