//! Entry point running a full comparison against two live catalogs

use crate::schema_diff::SchemaDiff;
use driftcheck_catalog::{build_snapshot, CatalogAdapter, CatalogError};
use driftcheck_core::{ComparisonConfig, DiscrepancyRecord};
use std::time::Duration;

/// Snapshot both catalogs concurrently and diff them.
///
/// Either snapshot failing fails the whole run; no partial diff is
/// returned. When `config` sets no canonical schema, the candidate
/// catalog's default schema is used.
pub async fn compare_schemas(
    reference: &dyn CatalogAdapter,
    candidate: &dyn CatalogAdapter,
    config: &ComparisonConfig,
) -> Result<Vec<DiscrepancyRecord>, CatalogError> {
    tracing::info!(
        reference = reference.name(),
        candidate = candidate.name(),
        "building schema snapshots"
    );

    let (reference_snapshot, candidate_snapshot) =
        tokio::try_join!(build_snapshot(reference), build_snapshot(candidate))?;

    let config = config.with_fallback_schema(candidate.default_schema());
    tracing::debug!(schema = config.canonical_schema(), "canonical schema");

    Ok(SchemaDiff::compare(&reference_snapshot, &candidate_snapshot, &config).into_records())
}

/// [`compare_schemas`] bounded by an overall deadline.
///
/// On expiry in-flight catalog queries are dropped and the run fails with
/// [`CatalogError::Timeout`].
pub async fn compare_schemas_within(
    reference: &dyn CatalogAdapter,
    candidate: &dyn CatalogAdapter,
    config: &ComparisonConfig,
    deadline: Duration,
) -> Result<Vec<DiscrepancyRecord>, CatalogError> {
    match tokio::time::timeout(deadline, compare_schemas(reference, candidate, config)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(?deadline, "schema comparison timed out");
            Err(CatalogError::Timeout(deadline))
        }
    }
}
