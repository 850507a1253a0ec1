//! driftcheck core
//!
//! Canonical schema model, discrepancy records and the report sink.
//! Discrepancy kinds and attribute names are part of the report format -
//! never rename them.

pub mod config;
pub mod discrepancy;
pub mod report;
pub mod schema;

pub use config::{
    ComparisonConfig, Config, ConfigError, ConnectionConfig, DatabaseEngine, IgnoredErrors,
    DEFAULT_CANONICAL_SCHEMA,
};
pub use discrepancy::{ColumnAttribute, DiscrepancyKind, DiscrepancyRecord, Side};
pub use report::{DiscrepancyReport, ReportFormat, ReportSummary, ReportVersion};
pub use schema::{
    is_unbounded_length, table_key, ColumnDescriptor, ForeignKeyMapping, SchemaSnapshot,
    TableIdentity, TableSnapshot, UNBOUNDED_LENGTH_THRESHOLD,
};
