//! Schema diff engine comparing a reference snapshot against a candidate
//!
//! The reference ("Application") snapshot is the source of truth; the
//! candidate ("Test") snapshot is the environment under test. Findings are
//! data: the diff never fails, it only collects records.

use driftcheck_core::{
    is_unbounded_length, ColumnAttribute, ColumnDescriptor, ComparisonConfig, DiscrepancyKind,
    DiscrepancyRecord, SchemaSnapshot, Side, TableIdentity, TableSnapshot,
};

/// Result of comparing two schema snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Discrepancies in emission order
    pub discrepancies: Vec<DiscrepancyRecord>,

    /// Tables compared at column level
    pub tables_compared: usize,
}

impl SchemaDiff {
    /// Compare two snapshots
    ///
    /// Runs three passes, in candidate iteration order:
    /// - Table presence: candidate tables in the canonical schema must exist
    ///   in the reference
    /// - Column presence, both directions, for tables found on both sides
    /// - Attribute equality for columns found on both sides
    pub fn compare(
        reference: &SchemaSnapshot,
        candidate: &SchemaSnapshot,
        config: &ComparisonConfig,
    ) -> Self {
        let mut collector = Collector::default();

        let working_set = check_table_presence(reference, candidate, config, &mut collector);

        for (reference_table, candidate_table) in &working_set {
            check_column_presence(reference_table, candidate_table, &mut collector);
            check_attributes(reference_table, candidate_table, config, &mut collector);
        }

        let diff = Self {
            discrepancies: collector.into_records(),
            tables_compared: working_set.len(),
        };

        tracing::info!(
            tables = diff.tables_compared,
            discrepancies = diff.discrepancies.len(),
            "schema comparison finished"
        );

        diff
    }

    /// Check if the schemas differ at all
    pub fn has_discrepancies(&self) -> bool {
        !self.discrepancies.is_empty()
    }

    /// Count discrepancies of one kind
    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_records(self) -> Vec<DiscrepancyRecord> {
        self.discrepancies
    }
}

/// Ordered sink threaded through the passes of one comparison
#[derive(Debug, Default)]
struct Collector {
    records: Vec<DiscrepancyRecord>,
}

impl Collector {
    fn push(&mut self, record: DiscrepancyRecord) {
        tracing::debug!(kind = %record.kind, message = %record.message, "discrepancy");
        self.records.push(record);
    }

    fn into_records(self) -> Vec<DiscrepancyRecord> {
        self.records
    }
}

/// Emit TABLE_MISSING for canonical candidate tables absent from the
/// reference and return the pairs present on both sides.
///
/// Tables outside the canonical schema, and tables only the reference has,
/// are neither flagged nor compared.
fn check_table_presence<'a>(
    reference: &'a SchemaSnapshot,
    candidate: &'a SchemaSnapshot,
    config: &ComparisonConfig,
    collector: &mut Collector,
) -> Vec<(&'a TableSnapshot, &'a TableSnapshot)> {
    let canonical = config.canonical_schema();
    let mut working_set = Vec::new();
    let mut in_scope = 0usize;

    for candidate_table in candidate.tables() {
        let identity = &candidate_table.identity;
        if identity.schema_name != canonical {
            continue;
        }
        in_scope += 1;

        match reference.get(&identity.key()) {
            Some(reference_table) => working_set.push((reference_table, candidate_table)),
            None => collector.push(DiscrepancyRecord::table_missing(identity, Side::Reference)),
        }
    }

    if in_scope == 0 && !candidate.is_empty() {
        tracing::warn!(
            schema = canonical,
            tables = candidate.len(),
            "no candidate table lives in the canonical schema; nothing was compared"
        );
    }

    working_set
}

/// Emit COLUMN_MISSING for columns only one side has.
///
/// Candidate columns absent from the reference come first, then reference
/// columns absent from the candidate. The record names the side the column
/// is missing from.
fn check_column_presence(
    reference: &TableSnapshot,
    candidate: &TableSnapshot,
    collector: &mut Collector,
) {
    let table = &candidate.identity;

    for column in &candidate.columns {
        if reference.find_column(&column.column_name).is_none() {
            collector.push(DiscrepancyRecord::column_missing(table, &column.column_name, Side::Reference));
        }
    }

    for column in &reference.columns {
        if candidate.find_column(&column.column_name).is_none() {
            collector.push(DiscrepancyRecord::column_missing(table, &column.column_name, Side::Candidate));
        }
    }
}

/// Emit COLUMN_ATTRIBUTE_MISMATCH for every differing attribute of columns
/// present on both sides.
fn check_attributes(
    reference: &TableSnapshot,
    candidate: &TableSnapshot,
    config: &ComparisonConfig,
    collector: &mut Collector,
) {
    let table = &candidate.identity;

    for column in &candidate.columns {
        if config.is_ignored(&column.column_name) || config.is_ignored(&table.table_name) {
            continue;
        }

        let Some(expected) = reference.find_column(&column.column_name) else {
            continue;
        };

        compare_column(table, expected, column, config, collector);
    }
}

/// Compare the enumerated attributes of one column pair.
///
/// `referenced_table_name` is never compared: target names legitimately
/// differ between environments.
fn compare_column(
    table: &TableIdentity,
    expected: &ColumnDescriptor,
    actual: &ColumnDescriptor,
    config: &ComparisonConfig,
    collector: &mut Collector,
) {
    let name = &actual.column_name;
    let mut push = |attribute: ColumnAttribute, e: String, a: String| {
        collector.push(DiscrepancyRecord::attribute_mismatch(table, name, attribute, e, a));
    };

    if expected.column_type != actual.column_type {
        push(ColumnAttribute::ColumnType, expected.column_type.clone(), actual.column_type.clone());
    }

    if !lengths_match(expected.column_length, actual.column_length) {
        push(
            ColumnAttribute::ColumnLength,
            render(&expected.column_length),
            render(&actual.column_length),
        );
    }

    if expected.precision != actual.precision {
        push(ColumnAttribute::Precision, render(&expected.precision), render(&actual.precision));
    }

    if expected.is_nullable != actual.is_nullable {
        push(
            ColumnAttribute::IsNullable,
            expected.is_nullable.to_string(),
            actual.is_nullable.to_string(),
        );
    }

    if !config.ignored_errors.primary_key && expected.is_primary_key != actual.is_primary_key {
        push(
            ColumnAttribute::IsPrimaryKey,
            expected.is_primary_key.to_string(),
            actual.is_primary_key.to_string(),
        );
    }

    if !config.ignored_errors.foreign_key && expected.is_foreign_key != actual.is_foreign_key {
        push(
            ColumnAttribute::IsForeignKey,
            expected.is_foreign_key.to_string(),
            actual.is_foreign_key.to_string(),
        );
    }

    if expected.column_default != actual.column_default {
        push(
            ColumnAttribute::ColumnDefault,
            render(&expected.column_default),
            render(&actual.column_default),
        );
    }

    if expected.collation != actual.collation {
        push(ColumnAttribute::Collation, render(&expected.collation), render(&actual.collation));
    }
}

/// Two unbounded lengths (`-1` or above the threshold) are equal
fn lengths_match(expected: Option<i32>, actual: Option<i32>) -> bool {
    match (expected, actual) {
        (Some(e), Some(a)) if is_unbounded_length(e) && is_unbounded_length(a) => true,
        _ => expected == actual,
    }
}

fn render<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map_or_else(|| "null".to_string(), ToString::to_string)
}
