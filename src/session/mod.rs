//! Database session collaborator

mod pool;

pub use pool::*;

use async_trait::async_trait;
use bytes::BytesMut;
use postgres_types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::error::ErrorPosition;
use tokio_postgres::{Client, NoTls};
use tracing::warn;

use crate::check::{CheckRow, EXTENSION_QUERY, FUNCTION_CHECK_QUERY};
use crate::error::{DbErrorInfo, SessionError};

/// The session surface the validation pipeline runs against.
///
/// The engine only ever issues `BEGIN`, one user statement with null-filled
/// positional arguments, `ROLLBACK`, migration files as raw SQL, and the
/// two fixed static-analysis queries.
#[async_trait]
pub trait ValidatorSession: Send + Sync {
    /// Run raw SQL, discarding any result.
    async fn batch_execute(&self, sql: &str) -> Result<(), SessionError>;

    /// Run one statement bound to `parameter_count` null arguments,
    /// returning the number of rows produced.
    async fn execute_with_nulls(
        &self,
        sql: &str,
        parameter_count: usize,
    ) -> Result<u64, SessionError>;

    /// Whether a named extension is installed in the connected database.
    async fn has_extension(&self, name: &str) -> Result<bool, SessionError>;

    /// Static-analysis rows for the plpgsql functions visible in the
    /// current transaction.
    async fn function_checks(&self) -> Result<Vec<CheckRow>, SessionError>;
}

/// A live `tokio-postgres` session.
pub struct PgSession {
    client: Client,
}

impl PgSession {
    /// Connect and drive the connection task in the background.
    pub async fn connect(config: &tokio_postgres::Config) -> Result<Self, SessionError> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("postgres connection terminated: {}", e);
            }
        });
        Ok(Self { client })
    }
}

#[async_trait]
impl ValidatorSession for PgSession {
    async fn batch_execute(&self, sql: &str) -> Result<(), SessionError> {
        self.client.batch_execute(sql).await.map_err(session_error)
    }

    async fn execute_with_nulls(
        &self,
        sql: &str,
        parameter_count: usize,
    ) -> Result<u64, SessionError> {
        let args = vec![NullArg; parameter_count];
        let params: Vec<&(dyn ToSql + Sync)> =
            args.iter().map(|a| a as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(sql, &params)
            .await
            .map_err(session_error)?;
        Ok(rows.len() as u64)
    }

    async fn has_extension(&self, name: &str) -> Result<bool, SessionError> {
        let rows = self
            .client
            .query(EXTENSION_QUERY, &[&name])
            .await
            .map_err(session_error)?;
        Ok(!rows.is_empty())
    }

    async fn function_checks(&self) -> Result<Vec<CheckRow>, SessionError> {
        let rows = self
            .client
            .query(FUNCTION_CHECK_QUERY, &[])
            .await
            .map_err(session_error)?;
        let mut checks = Vec::with_capacity(rows.len());
        for row in rows {
            let line: Option<i32> = row.try_get("lineno").map_err(session_error)?;
            checks.push(CheckRow {
                function: row.try_get("procedure").map_err(session_error)?,
                line: line.and_then(|l| u32::try_from(l).ok()),
                message: row.try_get("message").map_err(session_error)?,
                level: row.try_get("level").map_err(session_error)?,
            });
        }
        Ok(checks)
    }
}

/// A positional argument that binds as NULL whatever type the server
/// inferred for it.
#[derive(Debug, Clone, Copy)]
struct NullArg;

impl ToSql for NullArg {
    fn to_sql(
        &self,
        _ty: &Type,
        _out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Translate a driver error, keeping the fields needed to map the failure
/// back onto the document.
fn session_error(error: tokio_postgres::Error) -> SessionError {
    match error.as_db_error() {
        Some(db) => SessionError::Db(DbErrorInfo {
            message: db.message().to_string(),
            position: match db.position() {
                Some(ErrorPosition::Original(p)) => Some(*p as usize),
                Some(ErrorPosition::Internal { position, .. }) => Some(*position as usize),
                None => None,
            },
            code: Some(db.code().code().to_string()),
        }),
        None => SessionError::Connection(error.to_string()),
    }
}
