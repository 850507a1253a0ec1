//! SQL Server catalog adapter using sys.* and INFORMATION_SCHEMA
//!
//! This adapter reads table, key and column metadata from SQL Server's
//! catalog views. It works with:
//! - SQL Server 2016+ (database compatibility level 130 or higher)
//! - Azure SQL Database
//!
//! Every statement is parametrized. The bulk column query receives the
//! batch of tables as one JSON parameter unpacked with `OPENJSON`, so a
//! batch of any size is still a single bound value.
//!
//! Defaults come back wrapped as `((0))`, and `(n)varchar(max)` reports a
//! length of `-1`; both are handled by normalization and the diff.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = ConnectionConfig::from_env("DB")?; // DB_ENGINE=sqlserver
//! let adapter = SqlServerAdapter::connect(&config).await?;
//! let tables = adapter.list_tables().await?;
//! ```

use crate::adapter::{normalize_default, CatalogAdapter, CatalogError};
use driftcheck_core::{
    ColumnDescriptor, ConnectionConfig, DatabaseEngine, ForeignKeyMapping, TableIdentity,
};
use indexmap::IndexMap;
use tiberius::error::Error as TdsError;
use tiberius::{AuthMethod, Client, Config as TdsConfig, EncryptionLevel, Row, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

const LIST_TABLES: &str = r#"
    SELECT
        SCHEMA_NAME(tab.schema_id) AS schema_name,
        tab.name AS table_name
    FROM sys.tables AS tab
    ORDER BY tab.name, SCHEMA_NAME(tab.schema_id)
"#;

const PRIMARY_KEY_COLUMNS: &str = r#"
    SELECT kcu.COLUMN_NAME
    FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
    JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
      ON tc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
     AND tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
    WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
      AND tc.TABLE_SCHEMA = @P1
      AND tc.TABLE_NAME = @P2
    ORDER BY kcu.ORDINAL_POSITION
"#;

const FOREIGN_KEYS: &str = r#"
    SELECT
        fk.name AS key_name,
        pc.name AS column_name,
        rt.name AS referenced_table_name,
        c.name AS referenced_column_name
    FROM sys.foreign_key_columns AS fkc
    INNER JOIN sys.foreign_keys AS fk ON fkc.constraint_object_id = fk.object_id
    INNER JOIN sys.tables AS t ON fkc.parent_object_id = t.object_id
    INNER JOIN sys.tables AS rt ON fkc.referenced_object_id = rt.object_id
    INNER JOIN sys.columns AS pc ON fkc.parent_object_id = pc.object_id
      AND fkc.parent_column_id = pc.column_id
    INNER JOIN sys.columns AS c ON fkc.referenced_object_id = c.object_id
      AND fkc.referenced_column_id = c.column_id
    WHERE SCHEMA_NAME(t.schema_id) = @P1
      AND t.name = @P2
    ORDER BY fk.name, fkc.constraint_column_id
"#;

const COLUMNS_FOR_TABLES: &str = r#"
    SELECT
        c.TABLE_SCHEMA,
        c.TABLE_NAME,
        c.COLUMN_NAME,
        c.DATA_TYPE,
        c.CHARACTER_MAXIMUM_LENGTH,
        CAST(c.NUMERIC_PRECISION AS int) AS NUMERIC_PRECISION,
        CAST(CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS bit) AS IS_NULLABLE,
        c.COLUMN_DEFAULT,
        c.COLLATION_NAME
    FROM INFORMATION_SCHEMA.COLUMNS c
    JOIN OPENJSON(@P1) WITH (
        schema_name nvarchar(128) '$.schema_name',
        table_name nvarchar(128) '$.table_name'
    ) AS t
      ON c.TABLE_SCHEMA COLLATE DATABASE_DEFAULT = t.schema_name COLLATE DATABASE_DEFAULT
     AND c.TABLE_NAME COLLATE DATABASE_DEFAULT = t.table_name COLLATE DATABASE_DEFAULT
    ORDER BY c.TABLE_SCHEMA, c.TABLE_NAME, c.ORDINAL_POSITION
"#;

/// SQL Server catalog adapter
///
/// TDS has no request pipelining, so the single connection is guarded by a
/// mutex and concurrent catalog calls take turns.
pub struct SqlServerAdapter {
    client: Mutex<Client<Compat<TcpStream>>>,

    /// Connection host
    host: String,

    /// Connection port
    port: u16,

    /// Database name
    database: String,
}

impl SqlServerAdapter {
    /// Connect with SQL Server authentication, encrypting the session when
    /// `config.tls` is set
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, CatalogError> {
        let mut tds = TdsConfig::new();
        tds.host(&config.host);
        tds.port(config.port());
        tds.database(&config.database);
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
        tds.encryption(if config.tls {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });

        let target = config.display_target();
        tracing::debug!(target = %target, tls = config.tls, "connecting to SQL Server");

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| connect_error(&target, e))?;
        tcp.set_nodelay(true).map_err(|e| connect_error(&target, e))?;

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| connect_error(&target, e))?;

        Ok(Self {
            client: Mutex::new(client),
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

    async fn fetch(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        label: &str,
    ) -> Result<Vec<Row>, CatalogError> {
        let mut client = self.client.lock().await;

        let rows = client
            .query(sql, params)
            .await
            .map_err(|e| query_error(label, e))?
            .into_first_result()
            .await
            .map_err(|e| query_error(label, e))?;

        Ok(rows)
    }
}

fn connect_error(target: &str, e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Connectivity(format!("Failed to connect to SQL Server at {}: {}", target, e))
}

/// Server and decoding errors belong to the query; everything else means
/// the connection is unusable.
fn query_error(table: &str, e: TdsError) -> CatalogError {
    match e {
        TdsError::Server(token) => CatalogError::query(table, token.message()),
        TdsError::Conversion(message) => CatalogError::query(table, message),
        other => CatalogError::Connectivity(other.to_string()),
    }
}

/// JSON array of `{schema_name, table_name}` consumed by `OPENJSON`
fn batch_payload(tables: &[TableIdentity]) -> Result<String, CatalogError> {
    serde_json::to_string(tables)
        .map_err(|e| CatalogError::Config(format!("Failed to encode table batch: {}", e)))
}

fn text(row: &Row, idx: usize) -> Result<String, TdsError> {
    row.try_get::<&str, _>(idx)?
        .map(str::to_string)
        .ok_or_else(|| TdsError::Conversion(format!("unexpected NULL in column {}", idx).into()))
}

fn optional_text(row: &Row, idx: usize) -> Result<Option<String>, TdsError> {
    Ok(row.try_get::<&str, _>(idx)?.map(str::to_string))
}

fn column_from_row(row: &Row) -> Result<ColumnDescriptor, TdsError> {
    let default = optional_text(row, 7)?;

    Ok(ColumnDescriptor {
        schema_name: text(row, 0)?,
        table_name: text(row, 1)?,
        column_name: text(row, 2)?,
        column_type: text(row, 3)?,
        column_length: row.try_get::<i32, _>(4)?,
        precision: row.try_get::<i32, _>(5)?,
        is_nullable: row.try_get::<bool, _>(6)?.unwrap_or(true),
        is_primary_key: false,
        is_foreign_key: false,
        column_default: default.as_deref().map(normalize_default),
        collation: optional_text(row, 8)?,
        referenced_table_name: None,
    })
}

#[async_trait::async_trait]
impl CatalogAdapter for SqlServerAdapter {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn default_schema(&self) -> &str {
        DatabaseEngine::SqlServer.default_schema()
    }

    async fn list_tables(&self) -> Result<Vec<TableIdentity>, CatalogError> {
        tracing::debug!(database = %self.database, "listing tables");

        let rows = self.fetch(LIST_TABLES, &[], "sys.tables").await?;

        rows.iter()
            .map(|row| Ok(TableIdentity::new(text(row, 0)?, text(row, 1)?)))
            .collect::<Result<Vec<_>, TdsError>>()
            .map_err(|e| query_error("sys.tables", e))
    }

    async fn primary_key_columns(&self, table: &TableIdentity) -> Result<Vec<String>, CatalogError> {
        tracing::debug!(table = %table, "fetching primary key");
        let name = table.qualified_name();

        let rows = self
            .fetch(PRIMARY_KEY_COLUMNS, &[&table.schema_name, &table.table_name], &name)
            .await?;

        rows.iter()
            .map(|row| text(row, 0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| query_error(&name, e))
    }

    async fn foreign_keys(&self, table: &TableIdentity) -> Result<Vec<ForeignKeyMapping>, CatalogError> {
        tracing::debug!(table = %table, "fetching foreign keys");
        let name = table.qualified_name();

        let rows = self
            .fetch(FOREIGN_KEYS, &[&table.schema_name, &table.table_name], &name)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKeyMapping::new(
                    text(row, 0)?,
                    text(row, 1)?,
                    text(row, 2)?,
                    text(row, 3)?,
                ))
            })
            .collect::<Result<Vec<_>, TdsError>>()
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

        let payload = batch_payload(tables)?;
        let rows = self.fetch(COLUMNS_FOR_TABLES, &[&payload], &label).await?;

        for row in &rows {
            let column = column_from_row(row).map_err(|e| query_error(&label, e))?;
            let key = column.table().key();
            result.entry(key).or_default().push(column);
        }

        Ok(result)
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        let mut client = self.client.lock().await;

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| CatalogError::Connectivity(format!("Connection test failed: {}", e)))?
            .into_first_result()
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
        assert!(PRIMARY_KEY_COLUMNS.contains("tc.TABLE_SCHEMA = @P1"));
        assert!(PRIMARY_KEY_COLUMNS.contains("tc.TABLE_NAME = @P2"));
        assert!(FOREIGN_KEYS.contains("SCHEMA_NAME(t.schema_id) = @P1"));
        assert!(FOREIGN_KEYS.contains("t.name = @P2"));
        assert!(COLUMNS_FOR_TABLES.contains("OPENJSON(@P1)"));
    }

    #[test]
    fn listing_orders_by_table_then_schema() {
        assert!(LIST_TABLES.contains("FROM sys.tables"));
        assert!(LIST_TABLES.contains("ORDER BY tab.name, SCHEMA_NAME(tab.schema_id)"));
    }

    #[test]
    fn batch_payload_matches_openjson_paths() {
        let payload = batch_payload(&[
            TableIdentity::new("dbo", "orders"),
            TableIdentity::new("sales", "it's"),
        ])
        .unwrap();

        assert_eq!(
            payload,
            r#"[{"schema_name":"dbo","table_name":"orders"},{"schema_name":"sales","table_name":"it's"}]"#
        );
        assert!(COLUMNS_FOR_TABLES.contains("'$.schema_name'"));
        assert!(COLUMNS_FOR_TABLES.contains("'$.table_name'"));
    }

    #[test]
    fn decoding_errors_belong_to_the_query() {
        let err = query_error("dbo.orders", TdsError::Conversion("unexpected NULL in column 0".into()));
        assert!(matches!(err, CatalogError::MetadataQuery { ref table, .. } if table == "dbo.orders"));

        let err = query_error("dbo.orders", TdsError::Protocol("connection reset".into()));
        assert!(err.is_connectivity());
    }
}
