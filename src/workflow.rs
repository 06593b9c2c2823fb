//! The end-to-end batch workflow: compose the canonical ledger batch, send
//! it inside one transaction, read the results back in queue order and
//! optionally render them into a markdown report.

use tokio_postgres::Row;
use tracing::{debug, info};

use crate::{
    database::postgres::{
        batch::{Batch, BatchError},
        client::{PostgresClient, PostgresError, PostgresTransaction},
    },
    ledger::{LedgerEntry, LEDGER_TABLE},
    report::{render_report_header, render_statement_section, AsyncReportAppender},
    SqlValue,
};

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("Transaction error: {0}")]
    Transaction(#[from] PostgresError),

    #[error("{0}")]
    Batch(#[from] BatchError),

    #[error("Failed to decode ledger row: {0}")]
    RowDecode(tokio_postgres::Error),

    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

/// Decode a query's rows into ledger entries, in row order.
pub fn decode_entries(rows: &[Row]) -> Result<Vec<LedgerEntry>, tokio_postgres::Error> {
    rows.iter().map(LedgerEntry::try_from).collect()
}

fn compose_ledger_batch() -> Result<Batch, BatchError> {
    let mut batch = Batch::new();
    batch.queue_insert_values(
        LEDGER_TABLE,
        &["description", "amount"],
        vec![
            vec!["first item".into(), 1i64.into()],
            vec!["second item".into(), 2i64.into()],
        ],
    )?;
    batch.queue_query("SELECT id, description, amount FROM ledger ORDER BY id", vec![]);
    batch.queue_query(
        "SELECT id, description, amount FROM ledger WHERE amount = $1 ORDER BY id",
        vec![SqlValue::BigInt(1)],
    );
    Ok(batch)
}

/// Run the whole batch workflow: queue two inserts as one statement plus two
/// queries, transmit them in a single round trip, commit when every result
/// drains cleanly and roll back on any failure. Returns the rows seen by the
/// first query. A report is written when `report_path` is given.
pub async fn run_ledger_batch(
    client: &PostgresClient,
    report_path: Option<&str>,
) -> Result<Vec<LedgerEntry>, WorkflowError> {
    let batch = compose_ledger_batch()?;
    info!(statements = batch.len(), "Sending ledger batch");

    let mut conn = client.pooled_connection().await?;
    let transaction = PostgresTransaction::begin(&mut conn).await?;

    match read_and_report(&transaction, &batch, report_path).await {
        Ok(entries) => {
            transaction.commit().await?;
            info!(rows = entries.len(), "Ledger batch committed");
            Ok(entries)
        }
        Err(err) => {
            if let Err(rollback_err) = transaction.rollback().await {
                debug!("Rollback after failed batch also failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

async fn read_and_report(
    transaction: &PostgresTransaction<'_>,
    batch: &Batch,
    report_path: Option<&str>,
) -> Result<Vec<LedgerEntry>, WorkflowError> {
    let mut results = transaction.send_batch(batch).await?;

    let inserted = results.next_ack()?;
    debug!(inserted, "Insert acknowledged");

    let appender = report_path.map(AsyncReportAppender::new);
    if let Some(appender) = &appender {
        appender.append_line(render_report_header()).await?;
    }

    // the insert's slot is already consumed, the remaining statements are
    // queries with one result set each
    let skipped = batch.len() - results.remaining();
    let mut first_query_entries: Option<Vec<LedgerEntry>> = None;

    for statement in &batch.statements()[skipped..] {
        let rows = results.next_rows()?;
        let entries = decode_entries(&rows).map_err(WorkflowError::RowDecode)?;
        if let Some(appender) = &appender {
            appender.append_lines(render_statement_section(&statement.sql, &entries)).await?;
        }
        if first_query_entries.is_none() {
            first_query_entries = Some(entries);
        }
    }

    Ok(first_query_entries.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatementKind;

    #[test]
    fn test_canonical_batch_shape() {
        let batch = compose_ledger_batch().unwrap();
        assert_eq!(batch.len(), 3);

        let statements = batch.statements();
        assert_eq!(statements[0].kind, StatementKind::Exec);
        assert_eq!(
            statements[0].sql,
            "INSERT INTO ledger (description, amount) VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(statements[1].kind, StatementKind::Query);
        assert!(statements[1].sql.ends_with("ORDER BY id"));
        assert_eq!(statements[2].params, vec![SqlValue::BigInt(1)]);
    }
}
