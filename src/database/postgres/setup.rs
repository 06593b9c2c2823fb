use tracing::{debug, info};

use crate::database::postgres::client::{PostgresClient, PostgresError, PostgresTransaction};

#[derive(thiserror::Error, Debug)]
pub enum SetupLedgerError {
    #[error("Error creating ledger table: {0}")]
    CreateTable(#[from] PostgresError),
}

#[derive(thiserror::Error, Debug)]
pub enum CleanupLedgerError {
    #[error("{0}")]
    PostgresError(#[from] PostgresError),
}

/// Idempotent DDL for the ledger table. Safe to run on every start.
pub async fn setup_ledger(client: &PostgresClient) -> Result<(), SetupLedgerError> {
    info!("Setting up ledger table");
    let sql = "CREATE TABLE IF NOT EXISTS ledger (
        id BIGINT PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY,
        description TEXT NOT NULL,
        amount BIGINT NOT NULL
    );";
    debug!("{}", sql);
    client.batch_execute(sql).await?;
    info!("Ledger table ready");
    Ok(())
}

/// Delete every ledger row inside its own transaction, committing when the
/// delete succeeds and rolling back otherwise.
pub async fn cleanup_ledger(client: &PostgresClient) -> Result<u64, CleanupLedgerError> {
    let mut conn = client.pooled_connection().await?;
    let transaction = PostgresTransaction::begin(&mut conn).await?;

    match transaction.execute("DELETE FROM ledger", &[]).await {
        Ok(deleted) => {
            transaction.commit().await?;
            info!(deleted, "Ledger cleaned up");
            Ok(deleted)
        }
        Err(err) => {
            if let Err(rollback_err) = transaction.rollback().await {
                debug!("Rollback after failed cleanup also failed: {}", rollback_err);
            }
            Err(err.into())
        }
    }
}
