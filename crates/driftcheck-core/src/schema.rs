//! Canonical structural model of a database catalog
//!
//! Every catalog backend is normalized into these types before any
//! comparison happens. Downstream consumers (report writers, generators)
//! only ever read these descriptors, never the catalog itself.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lengths above this value are treated as "max" by convention.
pub const UNBOUNDED_LENGTH_THRESHOLD: i32 = 5000;

/// Identifies a table inside one database
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableIdentity {
    /// Owning schema (e.g. `dbo`, `public`)
    pub schema_name: String,

    /// Table name
    pub table_name: String,
}

impl TableIdentity {
    /// Create a new table identity
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }

    /// Uniqueness key used by snapshots (`schema+table`)
    pub fn key(&self) -> String {
        table_key(&self.schema_name, &self.table_name)
    }

    /// Dotted name for human-facing messages
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

impl std::fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}

/// Build the snapshot key for a schema/table pair
pub fn table_key(schema_name: &str, table_name: &str) -> String {
    format!("{}+{}", schema_name, table_name)
}

/// One column of one table, as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,

    /// Catalog-reported SQL type name (`int`, `varchar`, `numeric`, ...)
    pub column_type: String,

    /// Character length; `None` when the type is not length-bounded.
    /// `-1` or anything above [`UNBOUNDED_LENGTH_THRESHOLD`] means "max".
    pub column_length: Option<i32>,

    /// Numeric precision, when the catalog reports one
    pub precision: Option<i32>,

    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,

    /// Default expression with one level of redundant parentheses removed
    pub column_default: Option<String>,

    /// Collation name for character columns
    pub collation: Option<String>,

    /// Target table of the foreign key this column belongs to
    pub referenced_table_name: Option<String>,
}

impl ColumnDescriptor {
    /// Create a nullable, unconstrained column with no length or default
    pub fn new(
        table: &TableIdentity,
        column_name: impl Into<String>,
        column_type: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            column_name: column_name.into(),
            column_type: column_type.into(),
            column_length: None,
            precision: None,
            is_nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
            column_default: None,
            collation: None,
            referenced_table_name: None,
        }
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.column_length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: i32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.column_default = Some(default.into());
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Mark as part of the primary key (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    /// Mark as a foreign key column pointing at `referenced_table`
    pub fn foreign_key(mut self, referenced_table: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.referenced_table_name = Some(referenced_table.into());
        self
    }

    /// Identity of the owning table
    pub fn table(&self) -> TableIdentity {
        TableIdentity::new(&self.schema_name, &self.table_name)
    }

    /// Whether the length is the "max" sentinel
    pub fn has_unbounded_length(&self) -> bool {
        self.column_length.is_some_and(is_unbounded_length)
    }
}

/// `-1` and lengths above the threshold both mean "max"
pub fn is_unbounded_length(length: i32) -> bool {
    length == -1 || length > UNBOUNDED_LENGTH_THRESHOLD
}

/// A single foreign-key column mapping originating from a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyMapping {
    /// Constraint name
    pub key_name: String,

    /// Column on the owning table
    pub column_name: String,

    pub referenced_table_name: String,
    pub referenced_column_name: String,
}

impl ForeignKeyMapping {
    pub fn new(
        key_name: impl Into<String>,
        column_name: impl Into<String>,
        referenced_table_name: impl Into<String>,
        referenced_column_name: impl Into<String>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            column_name: column_name.into(),
            referenced_table_name: referenced_table_name.into(),
            referenced_column_name: referenced_column_name.into(),
        }
    }
}

/// Normalized columns of one table, in catalog order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub identity: TableIdentity,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSnapshot {
    pub fn new(identity: TableIdentity, columns: Vec<ColumnDescriptor>) -> Self {
        Self { identity, columns }
    }

    /// Find a column by exact name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }
}

/// Normalized capture of one database's schema.
///
/// Keys are [`TableIdentity::key`]; insertion order is preserved so that
/// every report built from a snapshot is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    tables: IndexMap<String, TableSnapshot>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, replacing any previous entry with the same key
    pub fn insert(&mut self, table: TableSnapshot) {
        self.tables.insert(table.identity.key(), table);
    }

    /// Builder-style insert
    pub fn with_table(mut self, identity: TableIdentity, columns: Vec<ColumnDescriptor>) -> Self {
        self.insert(TableSnapshot::new(identity, columns));
        self
    }

    pub fn get(&self, key: &str) -> Option<&TableSnapshot> {
        self.tables.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }

    /// Tables in insertion order
    pub fn tables(&self) -> impl Iterator<Item = &TableSnapshot> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of columns across all tables
    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }
}

impl FromIterator<TableSnapshot> for SchemaSnapshot {
    fn from_iter<I: IntoIterator<Item = TableSnapshot>>(iter: I) -> Self {
        let mut snapshot = SchemaSnapshot::new();
        for table in iter {
            snapshot.insert(table);
        }
        snapshot
    }
}
