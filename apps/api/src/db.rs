use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent DDL applied at startup, one statement per entry.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS contract_analyses (
        id              UUID PRIMARY KEY,
        owner_id        UUID NOT NULL,
        contract_type   TEXT NOT NULL,
        overall_score   DOUBLE PRECISION NOT NULL
                        CHECK (overall_score >= 0 AND overall_score <= 100),
        risks           JSONB NOT NULL DEFAULT '[]'::jsonb,
        recommendations JSONB NOT NULL DEFAULT '[]'::jsonb,
        summary         TEXT NOT NULL,
        file_name       TEXT NOT NULL,
        storage_key     TEXT NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS contract_analyses_owner_created_idx
        ON contract_analyses (owner_id, created_at DESC)
    "#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Applies the contract store schema.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to apply database schema")?;
    }
    info!("Database schema ready");
    Ok(())
}
