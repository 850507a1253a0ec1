//! driftcheck engine - schema comparison
//!
//! This crate implements the comparison logic:
//! - Schema diff between a reference and a candidate snapshot
//! - The `compare_schemas` entry point over two catalog adapters

pub mod compare;
pub mod schema_diff;

pub use compare::{compare_schemas, compare_schemas_within};
pub use schema_diff::SchemaDiff;
