//! PostgreSQL catalog adapter using information_schema
//!
//! This adapter reads table, key and column metadata from PostgreSQL's
//! information_schema views. It works with:
//! - PostgreSQL 9.4+
//! - Amazon Redshift
//! - CockroachDB
//! - Other PostgreSQL-compatible databases
//!
//! Every statement is parametrized; schema and table names never reach the
//! SQL text. All selected catalog columns are cast to plain `text`/`int4`
//! so decoding does not depend on information_schema domain types.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = ConnectionConfig::from_env("DB")?;
//! let adapter = PostgresAdapter::connect(&config).await?;
//! let tables = adapter.list_tables().await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema.html

use crate::adapter::{normalize_default, CatalogAdapter, CatalogError};
use driftcheck_core::{
    ColumnDescriptor, ConnectionConfig, DatabaseEngine, ForeignKeyMapping, TableIdentity,
};
use indexmap::IndexMap;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::future::Future;
use tokio_postgres::{Client, Config as PgConfig, NoTls, Row};

const LIST_TABLES: &str = r#"
    SELECT
        table_schema::text,
        table_name::text
    FROM information_schema.tables
    WHERE table_type = 'BASE TABLE'
      AND table_schema NOT IN ('pg_catalog', 'information_schema')
    ORDER BY table_name, table_schema
"#;

const PRIMARY_KEY_COLUMNS: &str = r#"
    SELECT kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_schema = kcu.constraint_schema
     AND tc.constraint_name = kcu.constraint_name
     AND tc.table_name = kcu.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = $1
      AND tc.table_name = $2
    ORDER BY kcu.ordinal_position
"#;

const FOREIGN_KEYS: &str = r#"
    SELECT
        kcu.constraint_name::text,
        kcu.column_name::text,
        ref.table_name::text,
        ref.column_name::text
    FROM information_schema.referential_constraints rc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_schema = rc.constraint_schema
     AND kcu.constraint_name = rc.constraint_name
    JOIN information_schema.key_column_usage ref
      ON ref.constraint_schema = rc.unique_constraint_schema
     AND ref.constraint_name = rc.unique_constraint_name
     AND ref.ordinal_position = kcu.position_in_unique_constraint
    WHERE kcu.table_schema = $1
      AND kcu.table_name = $2
    ORDER BY kcu.constraint_name, kcu.ordinal_position
"#;

const COLUMNS_FOR_TABLES: &str = r#"
    SELECT
        c.table_schema::text,
        c.table_name::text,
        c.column_name::text,
        c.data_type::text,
        c.character_maximum_length::int4,
        c.numeric_precision::int4,
        (c.is_nullable = 'YES') AS is_nullable,
        c.column_default::text,
        c.collation_name::text
    FROM information_schema.columns c
    JOIN unnest($1::text[], $2::text[]) AS t(schema_name, table_name)
      ON c.table_schema = t.schema_name
     AND c.table_name = t.table_name
    ORDER BY c.table_schema, c.table_name, c.ordinal_position
"#;

/// PostgreSQL catalog adapter
///
/// Holds one client for the lifetime of a run. Queries issued concurrently
/// on the client are pipelined over the same connection.
pub struct PostgresAdapter {
    client: Client,

    /// Connection host
    host: String,

    /// Connection port
    port: u16,

    /// Database name
    database: String,
}

impl PostgresAdapter {
    /// Connect using a [`ConnectionConfig`], over TLS when `config.tls` is set
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let adapter = PostgresAdapter::connect(&config.reference_connection()?).await?;
    /// ```
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, CatalogError> {
        let mut pg = PgConfig::new();
        pg.host(&config.host)
            .port(config.port())
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.database);

        let target = config.display_target();
        tracing::debug!(target = %target, tls = config.tls, "connecting to PostgreSQL");

        let client = if config.tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| CatalogError::Config(format!("Failed to create TLS connector: {}", e)))?;

            let (client, connection) = pg
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| connect_error(&target, e))?;
            spawn_connection(target, connection);
            client
        } else {
            let (client, connection) = pg
                .connect(NoTls)
                .await
                .map_err(|e| connect_error(&target, e))?;
            spawn_connection(target, connection);
            client
        };

        Ok(Self {
            client,
            host: config.host.clone(),
            port: config.port(),
            database: config.database.clone(),
        })
    }

    /// Get the connection host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the connection port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the database name
    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Drive the connection in the background; it ends when the client drops
fn spawn_connection<F>(target: String, connection: F)
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(target = %target, error = %e, "PostgreSQL connection error");
        }
    });
}

fn connect_error(target: &str, e: tokio_postgres::Error) -> CatalogError {
    CatalogError::Connectivity(format!("Failed to connect to PostgreSQL at {}: {}", target, e))
}

/// Server-side errors belong to the query; everything else means the
/// connection is unusable.
fn query_error(table: &str, e: tokio_postgres::Error) -> CatalogError {
    match e.as_db_error() {
        Some(db) => CatalogError::query(table, db.message()),
        None => CatalogError::Connectivity(e.to_string()),
    }
}

fn column_from_row(row: &Row) -> Result<ColumnDescriptor, tokio_postgres::Error> {
    let default: Option<String> = row.try_get(7)?;

    Ok(ColumnDescriptor {
        schema_name: row.try_get(0)?,
        table_name: row.try_get(1)?,
        column_name: row.try_get(2)?,
        column_type: row.try_get(3)?,
        column_length: row.try_get(4)?,
        precision: row.try_get(5)?,
        is_nullable: row.try_get::<_, Option<bool>>(6)?.unwrap_or(true),
        is_primary_key: false,
        is_foreign_key: false,
        column_default: default.as_deref().map(normalize_default),
        collation: row.try_get(8)?,
        referenced_table_name: None,
    })
}

#[async_trait::async_trait]
impl CatalogAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn default_schema(&self) -> &str {
        DatabaseEngine::Postgres.default_schema()
    }

    async fn list_tables(&self) -> Result<Vec<TableIdentity>, CatalogError> {
        tracing::debug!(database = %self.database, "listing tables");

        let rows = self
            .client
            .query(LIST_TABLES, &[])
            .await
            .map_err(|e| query_error("information_schema.tables", e))?;

        rows.iter()
            .map(|row| {
                Ok(TableIdentity::new(
                    row.try_get::<_, String>(0)?,
                    row.try_get::<_, String>(1)?,
                ))
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| query_error("information_schema.tables", e))
    }

    async fn primary_key_columns(&self, table: &TableIdentity) -> Result<Vec<String>, CatalogError> {
        tracing::debug!(table = %table, "fetching primary key");
        let name = table.qualified_name();

        let rows = self
            .client
            .query(PRIMARY_KEY_COLUMNS, &[&table.schema_name, &table.table_name])
            .await
            .map_err(|e| query_error(&name, e))?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| query_error(&name, e))
    }

    async fn foreign_keys(&self, table: &TableIdentity) -> Result<Vec<ForeignKeyMapping>, CatalogError> {
        tracing::debug!(table = %table, "fetching foreign keys");
        let name = table.qualified_name();

        let rows = self
            .client
            .query(FOREIGN_KEYS, &[&table.schema_name, &table.table_name])
            .await
            .map_err(|e| query_error(&name, e))?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKeyMapping::new(
                    row.try_get::<_, String>(0)?,
                    row.try_get::<_, String>(1)?,
                    row.try_get::<_, String>(2)?,
                    row.try_get::<_, String>(3)?,
                ))
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| query_error(&name, e))
    }

    async fn columns_for_tables(
        &self,
        tables: &[TableIdentity],
    ) -> Result<IndexMap<String, Vec<ColumnDescriptor>>, CatalogError> {
        let mut result: IndexMap<String, Vec<ColumnDescriptor>> = IndexMap::new();
        if tables.is_empty() {
            return Ok(result);
        }

        tracing::debug!(tables = tables.len(), "fetching column metadata");
        let label = match tables {
            [single] => single.qualified_name(),
            _ => format!("{} tables", tables.len()),
        };

        let schemas: Vec<String> = tables.iter().map(|t| t.schema_name.clone()).collect();
        let names: Vec<String> = tables.iter().map(|t| t.table_name.clone()).collect();

        let rows = self
            .client
            .query(COLUMNS_FOR_TABLES, &[&schemas, &names])
            .await
            .map_err(|e| query_error(&label, e))?;

        for row in &rows {
            let column = column_from_row(row).map_err(|e| query_error(&label, e))?;
            let key = column.table().key();
            result.entry(key).or_default().push(column);
        }

        Ok(result)
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| CatalogError::Connectivity(format!("Connection test failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_scoped_queries_are_parametrized() {
        for sql in [PRIMARY_KEY_COLUMNS, FOREIGN_KEYS] {
            assert!(sql.contains("table_schema = $1"));
            assert!(sql.contains("table_name = $2"));
        }
        assert!(COLUMNS_FOR_TABLES.contains("unnest($1::text[], $2::text[])"));
    }

    #[test]
    fn listing_skips_system_schemas() {
        assert!(LIST_TABLES.contains("'BASE TABLE'"));
        assert!(LIST_TABLES.contains("'pg_catalog', 'information_schema'"));
        assert!(LIST_TABLES.contains("ORDER BY table_name, table_schema"));
    }

    #[test]
    fn column_query_casts_every_selected_column() {
        let select = COLUMNS_FOR_TABLES
            .split("FROM")
            .next()
            .unwrap_or_default();
        let selected = select.lines().filter(|l| l.trim_start().starts_with("c.")).count();
        let cast = select.matches("::text").count() + select.matches("::int4").count();
        assert_eq!(selected, cast);
    }
}
