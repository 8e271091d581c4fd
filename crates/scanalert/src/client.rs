//! Generic client trait for unified database access.

use crate::error::{OrmError, OrmResult, ScanError, ScanResult};
use crate::hook::ExplainExecutor;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A trait that unifies the database clients an [`ObservedClient`](crate::ObservedClient)
/// can wrap.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// Semantics:
    /// - 0 rows: returns [`OrmError::NotFound`]
    /// - 1 row: returns that row
    /// - multiple rows: returns the first row (does **not** error)
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("Expected one row, got none"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Option<Row>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(OrmError::from)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(OrmError::from)
    }
}

/// Run an already-prefixed explain statement and decode every plan row as text.
///
/// The outer error means the statement failed; an inner error means that one row
/// could not be decoded and the rest are still usable.
pub(crate) async fn explain_rows<C: GenericClient + ?Sized>(
    client: &C,
    sql: &str,
) -> ScanResult<Vec<ScanResult<String>>> {
    let rows = client.query(sql, &[]).await?;

    Ok(rows
        .iter()
        .map(|row| {
            row.try_get::<_, String>(0)
                .map_err(|e| ScanError::RowScan(e.to_string()))
        })
        .collect())
}

#[async_trait::async_trait]
impl ExplainExecutor for tokio_postgres::Client {
    async fn explain(&self, sql: &str) -> ScanResult<Vec<ScanResult<String>>> {
        explain_rows(self, sql).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        // Delegate to the deref target (tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        GenericClient::query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute(client, sql, params).await
    }
}

#[cfg(feature = "pool")]
#[async_trait::async_trait]
impl ExplainExecutor for deadpool_postgres::Client {
    async fn explain(&self, sql: &str) -> ScanResult<Vec<ScanResult<String>>> {
        explain_rows(self, sql).await
    }
}
