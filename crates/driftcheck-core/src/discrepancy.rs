//! Discrepancy records produced by schema comparison
//!
//! IMPORTANT: discrepancy kinds and attribute names are part of the
//! report format consumed by CI jobs. Never rename them; add new ones.

use serde::{Deserialize, Serialize};

use crate::schema::TableIdentity;

/// Kind tag of a discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyKind {
    /// A candidate table in the canonical schema is absent from the reference
    TableMissing,

    /// A column exists on one side of a compared table but not the other
    ColumnMissing,

    /// A column exists on both sides with a differing attribute
    ColumnAttributeMismatch,
}

impl DiscrepancyKind {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TableMissing => "TABLE_MISSING",
            Self::ColumnMissing => "COLUMN_MISSING",
            Self::ColumnAttributeMismatch => "COLUMN_ATTRIBUTE_MISMATCH",
        }
    }
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which database a snapshot was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Known-good application database
    Reference,

    /// Environment under test
    Candidate,
}

impl Side {
    /// Label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reference => "Application",
            Self::Candidate => "Test",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Self::Reference => Self::Candidate,
            Self::Candidate => Self::Reference,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Comparable fields of a [`ColumnDescriptor`](crate::ColumnDescriptor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAttribute {
    ColumnType,
    ColumnLength,
    Precision,
    IsNullable,
    IsPrimaryKey,
    IsForeignKey,
    ColumnDefault,
    Collation,
}

impl ColumnAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColumnType => "column_type",
            Self::ColumnLength => "column_length",
            Self::Precision => "precision",
            Self::IsNullable => "is_nullable",
            Self::IsPrimaryKey => "is_primary_key",
            Self::IsForeignKey => "is_foreign_key",
            Self::ColumnDefault => "column_default",
            Self::Collation => "collation",
        }
    }
}

impl std::fmt::Display for ColumnAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One human-readable diagnostic line with structured metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    pub kind: DiscrepancyKind,

    pub schema_name: String,
    pub table_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<ColumnAttribute>,

    /// Side the table or column is absent from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_from: Option<Side>,

    /// Reference value (attribute mismatches only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Candidate value (attribute mismatches only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    pub message: String,
}

impl DiscrepancyRecord {
    /// A table present on the opposite side is absent from `missing_from`
    pub fn table_missing(table: &TableIdentity, missing_from: Side) -> Self {
        Self {
            kind: DiscrepancyKind::TableMissing,
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            column_name: None,
            attribute: None,
            missing_from: Some(missing_from),
            expected: None,
            actual: None,
            message: format!(
                "Table '{}' doesn't exist on {} database",
                table.qualified_name(),
                missing_from
            ),
        }
    }

    pub fn column_missing(
        table: &TableIdentity,
        column_name: impl Into<String>,
        missing_from: Side,
    ) -> Self {
        let column_name = column_name.into();
        Self {
            kind: DiscrepancyKind::ColumnMissing,
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            message: format!(
                "Column '{}' on table '{}' doesn't exist on {} database",
                column_name, table.table_name, missing_from
            ),
            column_name: Some(column_name),
            attribute: None,
            missing_from: Some(missing_from),
            expected: None,
            actual: None,
        }
    }

    pub fn attribute_mismatch(
        table: &TableIdentity,
        column_name: impl Into<String>,
        attribute: ColumnAttribute,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let column_name = column_name.into();
        let expected = expected.into();
        let actual = actual.into();
        Self {
            kind: DiscrepancyKind::ColumnAttributeMismatch,
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            message: format!(
                "Column '{}' on table '{}' has different {}: expected {} received {}",
                column_name, table.table_name, attribute, expected, actual
            ),
            column_name: Some(column_name),
            attribute: Some(attribute),
            missing_from: None,
            expected: Some(expected),
            actual: Some(actual),
        }
    }
}

impl std::fmt::Display for DiscrepancyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.message)
    }
}
