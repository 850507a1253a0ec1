//! Discrepancy report (stable v1)
//!
//! The report only accumulates: no dedup, no severity. Order of records
//! is the order they were pushed, and an artifact is only written when
//! at least one record exists.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::discrepancy::{DiscrepancyKind, DiscrepancyRecord};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Artifact format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One record per line
    #[default]
    Text,

    /// Versioned JSON document
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{}' (expected text or json)", other)),
        }
    }
}

/// Per-kind counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub tables_missing: usize,
    pub columns_missing: usize,
    pub attribute_mismatches: usize,
}

impl ReportSummary {
    fn record(&mut self, kind: DiscrepancyKind) {
        self.total += 1;
        match kind {
            DiscrepancyKind::TableMissing => self.tables_missing += 1,
            DiscrepancyKind::ColumnMissing => self.columns_missing += 1,
            DiscrepancyKind::ColumnAttributeMismatch => self.attribute_mismatches += 1,
        }
    }
}

/// Accumulated discrepancies of one comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    pub summary: ReportSummary,

    pub discrepancies: Vec<DiscrepancyRecord>,
}

impl DiscrepancyReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            discrepancies: Vec::new(),
        }
    }

    /// Create a report from records, keeping their order
    pub fn from_records(records: impl IntoIterator<Item = DiscrepancyRecord>) -> Self {
        let mut report = Self::new();
        report.extend(records);
        report
    }

    pub fn push(&mut self, record: DiscrepancyRecord) {
        self.summary.record(record.kind);
        self.discrepancies.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = DiscrepancyRecord>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.discrepancies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Number of records of one kind
    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        match kind {
            DiscrepancyKind::TableMissing => self.summary.tables_missing,
            DiscrepancyKind::ColumnMissing => self.summary.columns_missing,
            DiscrepancyKind::ColumnAttributeMismatch => self.summary.attribute_mismatches,
        }
    }

    /// One line per record
    pub fn lines(&self) -> Vec<String> {
        self.discrepancies.iter().map(|d| d.to_string()).collect()
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for line in self.lines() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Persist the report if it holds any record.
    ///
    /// An empty report returns `Ok(false)` and removes an artifact left at
    /// `path` by an earlier run, so the file's presence always means drift.
    pub fn write_if_any(&self, path: &Path, format: ReportFormat) -> Result<bool, std::io::Error> {
        if self.is_empty() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            return Ok(false);
        }

        let contents = match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self
                .to_json()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        };

        std::fs::write(path, contents)?;
        Ok(true)
    }
}

impl Default for DiscrepancyReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrepancy::{ColumnAttribute, Side};
    use crate::schema::TableIdentity;
    use pretty_assertions::assert_eq;

    fn sample_records() -> Vec<DiscrepancyRecord> {
        let customers = TableIdentity::new("dbo", "customers");
        let orders = TableIdentity::new("dbo", "orders");
        vec![
            DiscrepancyRecord::table_missing(&TableIdentity::new("dbo", "temp_cache"), Side::Reference),
            DiscrepancyRecord::column_missing(&customers, "name", Side::Candidate),
            DiscrepancyRecord::attribute_mismatch(&orders, "amount", ColumnAttribute::Precision, "2", "4"),
        ]
    }

    #[test]
    fn empty_report() {
        let report = DiscrepancyReport::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(report.is_empty());
    }

    #[test]
    fn summary_counts_per_kind() {
        let report = DiscrepancyReport::from_records(sample_records());
        assert_eq!(report.len(), 3);
        assert_eq!(report.count(DiscrepancyKind::TableMissing), 1);
        assert_eq!(report.count(DiscrepancyKind::ColumnMissing), 1);
        assert_eq!(report.count(DiscrepancyKind::ColumnAttributeMismatch), 1);
    }

    #[test]
    fn text_keeps_order_one_per_line() {
        let report = DiscrepancyReport::from_records(sample_records());
        let text = report.to_text();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("TABLE_MISSING"));
        assert!(lines[1].starts_with("COLUMN_MISSING"));
        assert!(lines[2].starts_with("COLUMN_ATTRIBUTE_MISMATCH"));
    }

    #[test]
    fn empty_report_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.txt");

        let written = DiscrepancyReport::new().write_if_any(&path, ReportFormat::Text).unwrap();
        assert!(!written);
        assert!(!path.exists());
    }

    #[test]
    fn empty_report_clears_stale_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.txt");
        DiscrepancyReport::from_records(sample_records())
            .write_if_any(&path, ReportFormat::Text)
            .unwrap();
        assert!(path.exists());

        let written = DiscrepancyReport::new().write_if_any(&path, ReportFormat::Text).unwrap();
        assert!(!written);
        assert!(!path.exists());
    }

    #[test]
    fn non_empty_report_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.txt");
        let report = DiscrepancyReport::from_records(sample_records());

        assert!(report.write_if_any(&path, ReportFormat::Text).unwrap());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, report.to_text());
    }

    #[test]
    fn json_artifact_is_versioned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.json");
        let report = DiscrepancyReport::from_records(sample_records());

        assert!(report.write_if_any(&path, ReportFormat::Json).unwrap());
        let parsed: DiscrepancyReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.summary, report.summary);
        assert_eq!(parsed.discrepancies, report.discrepancies);
    }

    #[test]
    fn report_format_parsing() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("TEXT".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }
}
