use pgbatch::{cleanup_ledger, run_ledger_batch, setup_info_logger, setup_ledger, PostgresClient};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_info_logger();

    // DATABASE_URL, read from the environment or a .env file
    let client = PostgresClient::new().await?;

    setup_ledger(&client).await?;

    let entries = run_ledger_batch(&client, Some("OUTPUT.md")).await?;
    info!(rows = entries.len(), "Report written to OUTPUT.md");

    cleanup_ledger(&client).await?;

    Ok(())
}
