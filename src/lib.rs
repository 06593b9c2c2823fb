mod database;
pub use database::postgres::{
    batch::{Batch, BatchError, BatchResults, QueuedStatement, StatementKind, StatementOutcome},
    client::{
        connection_string, PostgresClient, PostgresConnectionError, PostgresError, PostgresPool,
        PostgresPooledConnection, PostgresTransaction,
    },
    setup::{cleanup_ledger, setup_ledger, CleanupLedgerError, SetupLedgerError},
    sql_value::SqlValue,
};

mod ledger;
pub use ledger::{LedgerEntry, LEDGER_COLUMNS, LEDGER_TABLE};

mod logger;
pub use logger::{setup_info_logger, setup_logger};

mod report;
pub use report::AsyncReportAppender;

mod workflow;
pub use workflow::{decode_entries, run_ledger_batch, WorkflowError};

// export 3rd party dependencies
pub use tokio_postgres::types::ToSql;
pub use tokio_postgres::Row;
