//! Wire models for the Sumo Logic metrics API.
//!
//! Covers the three endpoints the datasource adapter talks to, all POST
//! with JSON bodies:
//!
//! - [`CATALOG_QUERY_PATH`]: metadata catalog lookup for a metrics selector
//! - [`AUTOCOMPLETE_PATH`]: completion suggestions at a cursor position
//! - [`ANNOTATED_RESULTS_PATH`]: batched time-series query
//!
//! Field names follow the backend's camelCase convention on the wire. All
//! payloads go through serde; nothing is assembled by string templating.

use serde::{Deserialize, Serialize};

/// Path of the catalog/metadata lookup endpoint.
pub const CATALOG_QUERY_PATH: &str = "/api/v1/metrics/meta/catalog/query";

/// Path of the autocomplete endpoint.
pub const AUTOCOMPLETE_PATH: &str = "/api/v1/metrics/suggest/autocomplete";

/// Path of the time-series query endpoint.
pub const ANNOTATED_RESULTS_PATH: &str = "/api/v1/metrics/annotated/results";

/// Request for the catalog query endpoint.
///
/// The endpoint takes a metrics selector and returns every time series
/// matching it, along with the dimensions and metatags of each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQueryRequest {
    pub query: String,
    pub offset: u64,
    pub limit: u64,
}

impl CatalogQueryRequest {
    /// Catalog lookup for a selector, with the paging window set wide
    /// enough for an exhaustive result.
    pub fn for_selector(selector: &str) -> Self {
        Self {
            query: selector.to_string(),
            offset: 0,
            limit: 100_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQueryResponse {
    #[serde(default)]
    pub results: Vec<CatalogEntry>,
}

/// One time series known to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub dimensions: Vec<KeyValue>,
    #[serde(default, rename = "metaTags")]
    pub meta_tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Full autocomplete request, as sent for template-variable value lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteRequest {
    pub query_id: String,
    pub query: String,
    pub pos: usize,
    pub api_version: String,
    pub query_start_time: i64,
    pub query_end_time: i64,
    pub requested_sections_and_counts: SectionCounts,
}

/// Which suggestion sections the backend should fill, and how many entries
/// each may carry. The backend distinguishes the `values` section from the
/// legacy `tokens` section by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

impl AutocompleteRequest {
    /// Value completions for `query` with the cursor at `pos`.
    pub fn values(query: &str, pos: usize, start: i64, end: i64) -> Self {
        Self::with_sections(
            query,
            pos,
            start,
            end,
            SectionCounts {
                values: Some(1000),
                tokens: None,
            },
        )
    }

    /// Legacy token-suggestion variant of [`AutocompleteRequest::values`].
    pub fn tokens(query: &str, pos: usize, start: i64, end: i64) -> Self {
        Self::with_sections(
            query,
            pos,
            start,
            end,
            SectionCounts {
                values: None,
                tokens: Some(1000),
            },
        )
    }

    fn with_sections(
        query: &str,
        pos: usize,
        start: i64,
        end: i64,
        sections: SectionCounts,
    ) -> Self {
        Self {
            query_id: "1".to_string(),
            query: query.to_string(),
            pos,
            api_version: "0.2.0".to_string(),
            query_start_time: start,
            query_end_time: end,
            requested_sections_and_counts: sections,
        }
    }
}

/// Minimal autocomplete request shape used by the query editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub query: String,
    pub pos: usize,
    pub query_start_time: i64,
    pub query_end_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteResponse {
    #[serde(default)]
    pub suggestions: Vec<SuggestionSection>,
}

/// One section of completion results, e.g. "Values".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSection {
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub items: Vec<SuggestionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionItem {
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<Replacement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub text: String,
}

/// One query row of a time-series request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRow {
    pub query: String,
    pub row_id: String,
}

/// Batched time-series query; every row is answered in one round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQueryRequest {
    pub query: Vec<QueryRow>,
    pub start_time: i64,
    pub end_time: i64,
    pub max_data_points: u64,
    pub requested_data_points: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_quantization_in_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsQueryResponse {
    #[serde(default)]
    pub response: Vec<QueryRowResult>,
}

/// Per-row response: either a set of series or a backend-side error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRowResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    /// Present only on error rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SeriesResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub metric: MetricDescriptor,
    pub datapoints: RawDataPoints,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

/// A key-value pair that is part of a time series' identity. `legend`
/// marks dimensions meant to appear in the synthesized series name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub legend: bool,
}

/// Parallel value/timestamp arrays; the two may differ in length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDataPoints {
    #[serde(default, deserialize_with = "float_array")]
    pub value: Vec<f64>,
    #[serde(default, deserialize_with = "float_array")]
    pub timestamp: Vec<f64>,
}

/// Datapoint entries arrive as JSON numbers or as numeric strings,
/// depending on backend version; both parse to `f64`.
fn float_array<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Number(f64),
        Text(String),
    }

    let entries = Vec::<Entry>::deserialize(deserializer)?;
    entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Number(number) => Ok(number),
            Entry::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        })
        .collect()
}

/// Structured error body returned by the backend on failed requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: serde_json::Value,
}

impl ApiError {
    /// The error as display text, whatever JSON type the backend used.
    pub fn message(&self) -> String {
        match &self.error {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
