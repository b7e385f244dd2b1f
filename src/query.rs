//! Query translation: the host's targets into backend query rows.

use serde::{Deserialize, Serialize};
use sumo_api::QueryRow;

use crate::error::DatasourceError;
use crate::template::{ScopedVars, VariableResolver};

/// Fraction of the panel-derived point count actually requested from the
/// backend. Empirically chosen; not a tunable.
const REQUESTED_POINTS_DIVISOR: f64 = 6.0;

/// Query time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// A range may be empty (start equals end) but never inverted.
    pub fn validate(&self) -> Result<(), DatasourceError> {
        if self.start > self.end {
            return Err(DatasourceError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// One expression the host wants plotted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTarget {
    /// Raw query expression, before template substitution.
    pub expr: String,
    /// Reference id, unique within the panel.
    pub ref_id: String,
    /// Hidden targets are not sent to the backend.
    pub hide: bool,
}

impl QueryTarget {
    pub fn new(expr: &str, ref_id: &str) -> Self {
        Self {
            expr: expr.to_string(),
            ref_id: ref_id.to_string(),
            hide: false,
        }
    }
}

/// Everything one panel refresh needs.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub range: TimeRange,
    pub targets: Vec<QueryTarget>,
    /// Active scoped variable bindings for substitution.
    pub scoped_vars: ScopedVars,
    /// Panel id; combined with each target's reference id into the row id.
    pub panel_id: i64,
    /// Upper bound of returned data points, derived from the panel width
    /// in pixels.
    pub max_data_points: u64,
    /// Interval string, e.g. `30s`.
    pub interval: String,
    /// Include the desired quantization hint in the request.
    pub quantization: bool,
}

impl QueryOptions {
    /// Targets that are actually sent: non-empty expression, not hidden.
    pub fn eligible_targets(&self) -> Vec<&QueryTarget> {
        self.targets
            .iter()
            .filter(|target| !target.expr.is_empty() && !target.hide)
            .collect()
    }

    /// Point count requested from the backend.
    pub fn requested_data_points(&self) -> u64 {
        (self.max_data_points as f64 / REQUESTED_POINTS_DIVISOR).round() as u64
    }
}

/// Substitute variables and derive row ids for every eligible target.
pub fn build_rows(
    options: &QueryOptions,
    resolver: &dyn VariableResolver,
) -> Result<Vec<QueryRow>, DatasourceError> {
    options
        .eligible_targets()
        .into_iter()
        .map(|target| {
            let query = resolver.replace(&target.expr, &options.scoped_vars)?;
            Ok(QueryRow {
                query,
                row_id: format!("{}{}", options.panel_id, target.ref_id),
            })
        })
        .collect()
}
