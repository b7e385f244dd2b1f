//! Reshaping backend query responses into flat series.

use serde::Serialize;
use sumo_api::{Dimension, QueryRowResult};

use crate::error::{DatasourceError, RowError};
use crate::query::QueryTarget;

/// One displayable time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    /// `(value, timestamp)` pairs in backend order.
    pub datapoints: Vec<(f64, f64)>,
}

/// Comma-joined `key=value` list of the dimensions flagged for legend
/// display, in their original order. No flagged dimensions yields an
/// empty name.
pub fn build_series_name(dimensions: &[Dimension]) -> String {
    let mut name = String::new();
    for dimension in dimensions.iter().filter(|d| d.legend) {
        if !name.is_empty() {
            name.push(',');
        }
        name.push_str(&dimension.key);
        name.push('=');
        name.push_str(&dimension.value);
    }
    name
}

/// Flatten per-row results into series, in request order.
///
/// `targets` are the eligible targets the request rows were built from, in
/// the same order. A row carrying a `messageType` is a backend-side
/// failure; any failed row fails the whole transformation with every
/// collected message, and no partial series are returned.
pub fn transform_rows(
    targets: &[&QueryTarget],
    rows: &[QueryRowResult],
) -> Result<Vec<Series>, DatasourceError> {
    let mut series = Vec::new();
    let mut errors = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        if row.message_type.is_some() {
            let message = row
                .message
                .clone()
                .unwrap_or_else(|| "unspecified query error".to_string());
            let ref_id = targets
                .get(index)
                .map(|target| target.ref_id.clone())
                .unwrap_or_default();
            tracing::error!(ref_id = %ref_id, message = %message, "query row failed");
            errors.push(RowError { ref_id, message });
            continue;
        }

        for result in &row.results {
            let name = build_series_name(&result.metric.dimensions);

            // The parallel arrays may disagree in length; zip to the
            // shorter one.
            let count = result
                .datapoints
                .value
                .len()
                .min(result.datapoints.timestamp.len());
            let datapoints = result.datapoints.value[..count]
                .iter()
                .zip(&result.datapoints.timestamp[..count])
                .map(|(value, timestamp)| (*value, *timestamp))
                .collect();

            series.push(Series { name, datapoints });
        }
    }

    if !errors.is_empty() {
        return Err(DatasourceError::SeriesTransform { errors });
    }

    Ok(series)
}
