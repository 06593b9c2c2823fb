//! Batch composition and ordered result consumption.
//!
//! A [`Batch`] records statements without executing anything; transmitting it
//! through `PostgresTransaction::send_batch` yields a [`BatchResults`] cursor
//! that hands back one outcome per queued statement, in queue order.

use tokio_postgres::Row;

use crate::database::postgres::sql_value::SqlValue;

#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("Batch is empty, nothing to send")]
    Empty,

    #[error("Multi-row insert requires at least one row of values")]
    EmptyInsert,

    #[error("Multi-row insert row {index} has {actual} values, expected {expected}")]
    RaggedInsertRow { index: usize, expected: usize, actual: usize },

    #[error("Statement {index} failed: {source}")]
    Statement {
        index: usize,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Batch results exhausted: only {queued} statements were queued")]
    Exhausted { queued: usize },

    #[error("Statement {index} was queued as a command, it has no rows to read")]
    NotAQuery { index: usize },

    #[error("Statement {index} was queued as a query, read its rows instead")]
    NotACommand { index: usize },
}

/// Whether a queued statement expects rows back or only an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Exec,
    Query,
}

#[derive(Debug, Clone)]
pub struct QueuedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub kind: StatementKind,
}

/// An ordered sequence of statements to be transmitted in one round trip.
/// Composing never touches the database.
#[derive(Debug, Default)]
pub struct Batch {
    statements: Vec<QueuedStatement>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a mutation. Its result is a row-count acknowledgment.
    pub fn queue_exec(&mut self, sql: impl Into<String>, params: Vec<SqlValue>) {
        self.statements.push(QueuedStatement { sql: sql.into(), params, kind: StatementKind::Exec });
    }

    /// Queue a query. Its result is a row set.
    pub fn queue_query(&mut self, sql: impl Into<String>, params: Vec<SqlValue>) {
        self.statements.push(QueuedStatement {
            sql: sql.into(),
            params,
            kind: StatementKind::Query,
        });
    }

    /// Queue a single INSERT carrying several value tuples, e.g. for two rows
    /// of two columns: `INSERT INTO ledger (description, amount) VALUES ($1, $2), ($3, $4)`.
    pub fn queue_insert_values(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<(), BatchError> {
        if rows.is_empty() {
            return Err(BatchError::EmptyInsert);
        }
        let total_columns = column_names.len();
        for (index, row) in rows.iter().enumerate() {
            if row.len() != total_columns {
                return Err(BatchError::RaggedInsertRow {
                    index,
                    expected: total_columns,
                    actual: row.len(),
                });
            }
        }

        let mut sql =
            format!("INSERT INTO {} ({}) VALUES ", table_name, column_names.join(", "));
        for (i, _) in rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let placeholders: Vec<String> =
                (0..total_columns).map(|j| format!("${}", i * total_columns + j + 1)).collect();
            sql.push_str(&format!("({})", placeholders.join(", ")));
        }

        let params: Vec<SqlValue> = rows.into_iter().flatten().collect();
        self.queue_exec(sql, params);
        Ok(())
    }

    pub fn statements(&self) -> &[QueuedStatement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// The outcome of one queued statement.
#[derive(Debug)]
pub enum StatementOutcome {
    /// Row count acknowledgment of a command.
    Ack(u64),
    /// Rows produced by a query.
    Rows(Vec<Row>),
}

/// Cursor over batch outcomes. One outcome per queued statement, consumed
/// strictly in queue order and exactly once each; advancing past the end
/// fails with [`BatchError::Exhausted`]. Dropping the cursor discards
/// whatever was not read.
#[derive(Debug)]
pub struct BatchResults {
    outcomes: Vec<StatementOutcome>,
    cursor: usize,
}

impl BatchResults {
    pub(crate) fn new(outcomes: Vec<StatementOutcome>) -> Self {
        Self { outcomes, cursor: 0 }
    }

    /// Number of statements the batch carried.
    pub fn queued(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.outcomes.len() - self.cursor
    }

    /// Discard the next `count` outcomes without inspecting them. The caller
    /// states how many leading results it wants to leave out rather than the
    /// reader assuming an offset.
    pub fn skip(&mut self, count: usize) -> Result<(), BatchError> {
        if self.cursor + count > self.outcomes.len() {
            return Err(BatchError::Exhausted { queued: self.outcomes.len() });
        }
        self.cursor += count;
        Ok(())
    }

    /// Consume the next outcome as a command acknowledgment.
    pub fn next_ack(&mut self) -> Result<u64, BatchError> {
        let index = self.cursor;
        match self.take_next()? {
            StatementOutcome::Ack(count) => Ok(*count),
            StatementOutcome::Rows(_) => Err(BatchError::NotACommand { index }),
        }
    }

    /// Consume the next outcome as a row set.
    pub fn next_rows(&mut self) -> Result<Vec<Row>, BatchError> {
        let index = self.cursor;
        match self.take_next()? {
            StatementOutcome::Rows(rows) => Ok(std::mem::take(rows)),
            StatementOutcome::Ack(_) => Err(BatchError::NotAQuery { index }),
        }
    }

    fn take_next(&mut self) -> Result<&mut StatementOutcome, BatchError> {
        let queued = self.outcomes.len();
        let outcome = self
            .outcomes
            .get_mut(self.cursor)
            .ok_or(BatchError::Exhausted { queued })?;
        self.cursor += 1;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_order() {
        let mut batch = Batch::new();
        batch.queue_exec("DELETE FROM ledger", vec![]);
        batch.queue_query("SELECT id, description, amount FROM ledger ORDER BY id", vec![]);
        batch.queue_query(
            "SELECT id, description, amount FROM ledger WHERE amount = $1",
            vec![SqlValue::BigInt(1)],
        );

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.statements()[0].kind, StatementKind::Exec);
        assert_eq!(batch.statements()[1].kind, StatementKind::Query);
        assert!(batch.statements()[2].sql.contains("WHERE amount"));
        assert_eq!(batch.statements()[2].params, vec![SqlValue::BigInt(1)]);
    }

    #[test]
    fn test_multi_row_insert_builds_placeholder_grid() {
        let mut batch = Batch::new();
        batch
            .queue_insert_values(
                "ledger",
                &["description", "amount"],
                vec![
                    vec!["first item".into(), 1i64.into()],
                    vec!["second item".into(), 2i64.into()],
                ],
            )
            .unwrap();

        let statement = &batch.statements()[0];
        assert_eq!(
            statement.sql,
            "INSERT INTO ledger (description, amount) VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("first item".to_string()),
                SqlValue::BigInt(1),
                SqlValue::Text("second item".to_string()),
                SqlValue::BigInt(2),
            ]
        );
        assert_eq!(statement.kind, StatementKind::Exec);
    }

    #[test]
    fn test_multi_row_insert_rejects_empty_and_ragged_rows() {
        let mut batch = Batch::new();
        assert!(matches!(
            batch.queue_insert_values("ledger", &["description", "amount"], vec![]),
            Err(BatchError::EmptyInsert)
        ));

        let result = batch.queue_insert_values(
            "ledger",
            &["description", "amount"],
            vec![vec!["first item".into(), 1i64.into()], vec!["second item".into()]],
        );
        assert!(matches!(
            result,
            Err(BatchError::RaggedInsertRow { index: 1, expected: 2, actual: 1 })
        ));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_results_consumed_in_order() {
        let mut results =
            BatchResults::new(vec![StatementOutcome::Ack(2), StatementOutcome::Ack(1)]);
        assert_eq!(results.queued(), 2);
        assert_eq!(results.next_ack().unwrap(), 2);
        assert_eq!(results.remaining(), 1);
        assert_eq!(results.next_ack().unwrap(), 1);
        assert_eq!(results.remaining(), 0);
    }

    #[test]
    fn test_reading_past_the_end_fails_loudly() {
        let mut results = BatchResults::new(vec![StatementOutcome::Ack(1)]);
        results.next_ack().unwrap();
        assert!(matches!(results.next_ack(), Err(BatchError::Exhausted { queued: 1 })));
        assert!(matches!(results.next_rows(), Err(BatchError::Exhausted { queued: 1 })));
    }

    #[test]
    fn test_skip_is_bounded() {
        let mut results =
            BatchResults::new(vec![StatementOutcome::Ack(1), StatementOutcome::Ack(2)]);
        results.skip(1).unwrap();
        assert_eq!(results.next_ack().unwrap(), 2);
        assert!(matches!(results.skip(1), Err(BatchError::Exhausted { queued: 2 })));
    }

    #[test]
    fn test_kind_mismatch_is_reported_with_statement_index() {
        let mut results =
            BatchResults::new(vec![StatementOutcome::Ack(1), StatementOutcome::Rows(vec![])]);
        assert!(matches!(results.next_rows(), Err(BatchError::NotAQuery { index: 0 })));
        // the mismatch consumed slot 0, slot 1 is a row set
        assert!(matches!(results.next_ack(), Err(BatchError::NotACommand { index: 1 })));
    }
}
