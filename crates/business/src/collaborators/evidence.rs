use super::EvidenceStore;
use aidfund_core::{Amount, Receipt};
use aidfund_persistence::ReceiptRepo;
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

/// Receipt metadata kept next to the fund tables.
pub struct SqliteEvidenceStore {
    pool: SqlitePool,
}

impl SqliteEvidenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceStore for SqliteEvidenceStore {
    async fn attach_evidence(
        &self,
        request_id: &str,
        uploader_id: &str,
        locator: &str,
        declared_amount: Option<Amount>,
    ) -> anyhow::Result<String> {
        let mut receipt = Receipt::new(request_id, uploader_id, locator);
        if let Some(amount) = declared_amount {
            receipt = receipt.with_declared_amount(amount);
        }
        let mut conn = self.pool.acquire().await?;
        ReceiptRepo::insert(&mut conn, &receipt).await?;
        Ok(receipt.id)
    }

    async fn has_active_evidence(&self, request_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(ReceiptRepo::has_active(&mut conn, request_id).await?)
    }

    async fn is_active_artifact(
        &self,
        request_id: &str,
        artifact_id: &str,
    ) -> anyhow::Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(ReceiptRepo::is_active_for(&mut conn, request_id, artifact_id).await?)
    }

    async fn confirm_active_in(
        &self,
        conn: &mut SqliteConnection,
        request_id: &str,
        artifact_id: &str,
    ) -> anyhow::Result<bool> {
        Ok(ReceiptRepo::is_active_for(conn, request_id, artifact_id).await?)
    }

    async fn get_evidence(&self, artifact_id: &str) -> anyhow::Result<Option<Receipt>> {
        let mut conn = self.pool.acquire().await?;
        match ReceiptRepo::get_by_id(&mut conn, artifact_id).await {
            Ok(receipt) => Ok(Some(receipt)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_evidence(&self, request_id: &str) -> anyhow::Result<Vec<Receipt>> {
        let mut conn = self.pool.acquire().await?;
        Ok(ReceiptRepo::list_for_request(&mut conn, request_id).await?)
    }

    async fn void_evidence(&self, artifact_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(ReceiptRepo::void(&mut conn, artifact_id).await?)
    }
}
