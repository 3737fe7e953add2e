//! Contract Store — persistence of completed analyses.
//!
//! Ownership is enforced here, not only in the handlers: every read or delete
//! of a single record takes the requesting owner and fails with `Forbidden`
//! when it does not match.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::contract::{ContractAnalysis, ContractRow};

#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// Fails with `DuplicateId` if a record with the same id exists.
    async fn create(&self, analysis: &ContractAnalysis) -> Result<(), AppError>;

    /// Analyses owned by `owner_id`, newest first. `None` returns all of them.
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ContractAnalysis>, AppError>;

    async fn get_by_id(&self, id: Uuid, requesting_owner: Uuid)
        -> Result<ContractAnalysis, AppError>;

    /// Hard delete. Returns the removed record so the caller can drop its file.
    async fn delete(&self, id: Uuid, requesting_owner: Uuid) -> Result<ContractAnalysis, AppError>;
}

pub fn ensure_owner(analysis: &ContractAnalysis, requesting_owner: Uuid) -> Result<(), AppError> {
    if analysis.owner_id != requesting_owner {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Contract {id} not found"))
}

pub struct PgContractStore {
    pool: PgPool,
}

impl PgContractStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContractRepository for PgContractStore {
    async fn create(&self, analysis: &ContractAnalysis) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO contract_analyses
                (id, owner_id, contract_type, overall_score, risks, recommendations,
                 summary, file_name, storage_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.owner_id)
        .bind(analysis.contract_type.as_str())
        .bind(analysis.overall_score)
        .bind(Json(&analysis.risks))
        .bind(Json(&analysis.recommendations))
        .bind(&analysis.summary)
        .bind(&analysis.file_name)
        .bind(&analysis.storage_key)
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DuplicateId(format!("Contract {} already exists", analysis.id))
            }
            other => AppError::Database(other),
        })?;

        info!(
            "Stored contract {} ({}) for owner {}",
            analysis.id, analysis.contract_type, analysis.owner_id
        );
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ContractAnalysis>, AppError> {
        // LIMIT NULL is no limit in Postgres.
        let rows = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT * FROM contract_analyses
            WHERE owner_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| ContractAnalysis::try_from(row).map_err(AppError::Internal))
            .collect()
    }

    async fn get_by_id(
        &self,
        id: Uuid,
        requesting_owner: Uuid,
    ) -> Result<ContractAnalysis, AppError> {
        let row = sqlx::query_as::<_, ContractRow>("SELECT * FROM contract_analyses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?;

        let analysis = ContractAnalysis::try_from(row)?;
        ensure_owner(&analysis, requesting_owner)?;
        Ok(analysis)
    }

    async fn delete(&self, id: Uuid, requesting_owner: Uuid) -> Result<ContractAnalysis, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ContractRow>(
            "SELECT * FROM contract_analyses WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(id))?;

        let analysis = ContractAnalysis::try_from(row)?;
        ensure_owner(&analysis, requesting_owner)?;

        sqlx::query("DELETE FROM contract_analyses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Deleted contract {id} for owner {requesting_owner}");
        Ok(analysis)
    }
}
