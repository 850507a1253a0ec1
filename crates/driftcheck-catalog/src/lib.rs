//! Catalog adapters and snapshot building for schema drift detection
//!
//! This crate reads table, key and column metadata from a database catalog
//! and normalizes it into a [`SchemaSnapshot`](driftcheck_core::SchemaSnapshot).
//!
//! ## Features
//!
//! Enable database support via Cargo features:
//! - `postgres` - PostgreSQL/Redshift support
//! - `sqlserver` - SQL Server/Azure SQL support
//!
//! The in-memory [`MockAdapter`] is always available.
//!
//! ## Example
//!
//! ```rust,ignore
//! use driftcheck_catalog::{build_snapshot, PostgresAdapter};
//!
//! let adapter = PostgresAdapter::connect(&config.reference_connection()?).await?;
//! let snapshot = build_snapshot(&adapter).await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod normalizer;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod snapshot;
#[cfg(feature = "sqlserver")]
pub mod sqlserver;

pub use adapter::{normalize_default, CatalogAdapter, CatalogError};
pub use mock::{MockAdapter, MockTable};
pub use normalizer::{normalize_table, TableKeys};
#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;
pub use snapshot::{build_snapshot, build_snapshot_for};
#[cfg(feature = "sqlserver")]
pub use sqlserver::SqlServerAdapter;
