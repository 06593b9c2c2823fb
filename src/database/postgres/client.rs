use std::{env, time::Duration};

use bb8::{Pool, PooledConnection, RunError};
use bb8_postgres::PostgresConnectionManager;
use dotenv::dotenv;
use futures::future::try_join_all;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio::{task, time::timeout};
use tokio_postgres::{
    config::SslMode, types::ToSql, Config, Row, ToStatement, Transaction as PgTransaction,
};
use tracing::error;

use crate::database::postgres::batch::{
    Batch, BatchError, BatchResults, StatementKind, StatementOutcome,
};

pub fn connection_string() -> Result<String, env::VarError> {
    dotenv().ok();
    let connection = env::var("DATABASE_URL")?;
    Ok(connection)
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresConnectionError {
    #[error("The database connection string is wrong please check your environment: {0}")]
    DatabaseConnectionConfigWrong(#[from] env::VarError),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] tokio_postgres::Error),

    #[error("Connection pool runtime error: {0}")]
    ConnectionPoolRuntimeError(#[from] RunError<tokio_postgres::Error>),

    #[error("Can not connect to the database please make sure your connection string is correct")]
    CanNotConnectToDatabase,

    #[error("Could not parse connection string make sure it is correctly formatted")]
    CouldNotParseConnectionString,

    #[error("Could not create tls connector")]
    CouldNotCreateTlsConnector,
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresError {
    #[error("PgError {0}")]
    PgError(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] RunError<tokio_postgres::Error>),
}

pub type PostgresPool = Pool<PostgresConnectionManager<MakeTlsConnector>>;
pub type PostgresPooledConnection<'a> =
    PooledConnection<'a, PostgresConnectionManager<MakeTlsConnector>>;

/// A transaction checked out of the pool. Commit and rollback consume the
/// wrapper; dropping it without either rolls the transaction back.
pub struct PostgresTransaction<'a> {
    transaction: PgTransaction<'a>,
}

impl<'a> PostgresTransaction<'a> {
    pub async fn begin(
        conn: &'a mut PostgresPooledConnection<'_>,
    ) -> Result<PostgresTransaction<'a>, PostgresError> {
        let transaction = conn.transaction().await.map_err(PostgresError::PgError)?;
        Ok(PostgresTransaction { transaction })
    }

    pub async fn execute(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, PostgresError> {
        self.transaction.execute(query, params).await.map_err(PostgresError::PgError)
    }

    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, PostgresError> {
        self.transaction.query(query, params).await.map_err(PostgresError::PgError)
    }

    /// Transmit every queued statement in one round trip. The statement
    /// futures are polled concurrently so tokio-postgres pipelines them, and
    /// their outcomes come back in queue order. The first statement error
    /// aborts the batch; outcomes of the remaining statements are discarded.
    pub async fn send_batch(&self, batch: &Batch) -> Result<BatchResults, BatchError> {
        if batch.is_empty() {
            return Err(BatchError::Empty);
        }

        let statement_futures =
            batch.statements().iter().enumerate().map(|(index, statement)| async move {
                let params: Vec<&(dyn ToSql + Sync)> =
                    statement.params.iter().map(|param| param as &(dyn ToSql + Sync)).collect();

                match statement.kind {
                    StatementKind::Exec => self
                        .transaction
                        .execute(statement.sql.as_str(), &params)
                        .await
                        .map(StatementOutcome::Ack)
                        .map_err(|source| BatchError::Statement { index, source }),
                    StatementKind::Query => self
                        .transaction
                        .query(statement.sql.as_str(), &params)
                        .await
                        .map(StatementOutcome::Rows)
                        .map_err(|source| BatchError::Statement { index, source }),
                }
            });

        let outcomes = try_join_all(statement_futures).await?;
        Ok(BatchResults::new(outcomes))
    }

    pub async fn commit(self) -> Result<(), PostgresError> {
        self.transaction.commit().await.map_err(PostgresError::PgError)
    }

    pub async fn rollback(self) -> Result<(), PostgresError> {
        self.transaction.rollback().await.map_err(PostgresError::PgError)
    }
}

pub struct PostgresClient {
    pool: PostgresPool,
}

const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

impl PostgresClient {
    /// Probe the server with a direct connection (bounded by
    /// [`CONNECT_PROBE_TIMEOUT`]), falling back to an unencrypted connection
    /// when the TLS handshake is rejected, then build the pool.
    pub async fn new() -> Result<Self, PostgresConnectionError> {
        async fn _new(disable_ssl: bool) -> Result<PostgresClient, PostgresConnectionError> {
            let connection_str = connection_string()?;
            let mut config: Config = connection_str
                .parse()
                .map_err(|_| PostgresConnectionError::CouldNotParseConnectionString)?;

            if disable_ssl {
                config.ssl_mode(SslMode::Disable);
            }

            let connector = TlsConnector::builder()
                .build()
                .map_err(|_| PostgresConnectionError::CouldNotCreateTlsConnector)?;
            let tls_connector = MakeTlsConnector::new(connector);

            let (client, connection) =
                match timeout(CONNECT_PROBE_TIMEOUT, config.connect(tls_connector.clone())).await {
                    Ok(Ok((client, connection))) => (client, connection),
                    Ok(Err(e)) => {
                        // retry once without ssl unless the caller insisted on it
                        if !disable_ssl
                            && config.get_ssl_mode() != SslMode::Disable
                            && !connection_str.contains("sslmode=require")
                        {
                            return Box::pin(_new(true)).await;
                        }
                        error!("Error connecting to database: {}", e);
                        return Err(PostgresConnectionError::CanNotConnectToDatabase);
                    }
                    Err(e) => {
                        error!("Timeout connecting to database: {}", e);
                        return Err(PostgresConnectionError::CanNotConnectToDatabase);
                    }
                };

            let connection_handle = task::spawn(connection);

            if client.query_one("SELECT 1", &[]).await.is_err() {
                return Err(PostgresConnectionError::CanNotConnectToDatabase);
            }

            // closing the probe client must also wind down its connection task
            drop(client);
            match connection_handle.await {
                Ok(Ok(())) => (),
                Ok(Err(_)) | Err(_) => {
                    return Err(PostgresConnectionError::CanNotConnectToDatabase)
                }
            }

            let manager = PostgresConnectionManager::new(config, tls_connector);
            let pool = Pool::builder().build(manager).await?;

            Ok(PostgresClient { pool })
        }

        _new(false).await
    }

    /// Check a connection out of the pool, e.g. to open a transaction on it.
    pub async fn pooled_connection(
        &self,
    ) -> Result<PostgresPooledConnection<'_>, PostgresError> {
        self.pool.get().await.map_err(PostgresError::ConnectionPoolError)
    }

    pub async fn batch_execute(&self, sql: &str) -> Result<(), PostgresError> {
        let conn = self.pool.get().await?;
        conn.batch_execute(sql).await.map_err(PostgresError::PgError)
    }

    pub async fn execute<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        conn.execute(query, params).await.map_err(PostgresError::PgError)
    }

    pub async fn query<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        let rows = conn.query(query, params).await.map_err(PostgresError::PgError)?;
        Ok(rows)
    }

    pub async fn query_one<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        let row = conn.query_one(query, params).await.map_err(PostgresError::PgError)?;
        Ok(row)
    }

    pub async fn query_one_or_none<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        let row = conn.query_opt(query, params).await.map_err(PostgresError::PgError)?;
        Ok(row)
    }
}
