//! Template-variable metadata queries.
//!
//! Variable queries use a small pipe-separated language dispatched against
//! the backend's metadata endpoints:
//!
//! - `dimensions|<key>|<selector>`: distinct values of one dimension,
//!   via the catalog endpoint
//! - `metaTags|<key>|<selector>`: distinct values of one metatag,
//!   via the catalog endpoint
//! - `metrics|<selector>`: all metric names matching the selector,
//!   via the catalog endpoint
//! - `values|<key>|<selector>`: value completions for a key, via the
//!   autocomplete endpoint
//!
//! The catalog endpoint returns every matching time series with all of its
//! dimensions and metatags, so the first three forms scan a potentially
//! verbose result for the values they are after. The `values` form asks
//! the autocomplete endpoint directly, which already answers with distinct
//! values.

use std::collections::HashSet;

use sumo_api::{
    AUTOCOMPLETE_PATH, AutocompleteRequest, AutocompleteResponse, CATALOG_QUERY_PATH,
    CatalogQueryRequest, CatalogQueryResponse,
};

use crate::error::DatasourceError;
use crate::query::TimeRange;
use crate::transport::SumoClient;

/// A parsed template-variable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataQuery {
    /// Distinct values of one dimension across catalog entries matching
    /// the selector.
    Dimensions { key: String, selector: String },
    /// Distinct values of one metatag across catalog entries matching the
    /// selector.
    MetaTags { key: String, selector: String },
    /// Names of all metrics matching the selector.
    Metrics { selector: String },
    /// Value completions for a key, constrained by the selector.
    Values { key: String, selector: String },
}

/// A label surfaced to the host's variable picker or autocomplete widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    /// Whether the host may expand this entry further.
    pub expandable: bool,
}

impl MetadataQuery {
    /// Parse a pipe-separated variable query. Unknown prefixes, missing
    /// fields, and empty input all fail with
    /// [`DatasourceError::UnknownMetricFindQuery`] carrying the input.
    pub fn parse(query: &str) -> Result<Self, DatasourceError> {
        let unknown = || DatasourceError::UnknownMetricFindQuery(query.to_string());

        let (prefix, rest) = query.split_once('|').ok_or_else(unknown)?;
        match prefix {
            "dimensions" => {
                let (key, selector) = rest.split_once('|').ok_or_else(unknown)?;
                Ok(Self::Dimensions {
                    key: key.to_string(),
                    selector: selector.to_string(),
                })
            }
            "metaTags" => {
                let (key, selector) = rest.split_once('|').ok_or_else(unknown)?;
                Ok(Self::MetaTags {
                    key: key.to_string(),
                    selector: selector.to_string(),
                })
            }
            "metrics" => Ok(Self::Metrics {
                selector: rest.to_string(),
            }),
            "values" => {
                let (key, selector) = rest.split_once('|').ok_or_else(unknown)?;
                Ok(Self::Values {
                    key: key.to_string(),
                    selector: selector.to_string(),
                })
            }
            _ => Err(unknown()),
        }
    }

    /// Run the query against the backend and reshape the result into
    /// suggestions. The range feeds the autocomplete path; catalog paths
    /// ignore it.
    pub async fn resolve(
        &self,
        client: &SumoClient,
        range: Option<TimeRange>,
    ) -> Result<Vec<Suggestion>, DatasourceError> {
        match self {
            Self::Dimensions { key, selector } => {
                let catalog = query_catalog(client, selector).await?;
                // First matching dimension per catalog entry; the key is
                // compared trimmed.
                let wanted = key.trim();
                let values = catalog.results.iter().filter_map(|entry| {
                    entry
                        .dimensions
                        .iter()
                        .find(|dimension| dimension.key == wanted)
                        .map(|dimension| dimension.value.clone())
                });
                Ok(distinct_suggestions(values))
            }
            Self::MetaTags { key, selector } => {
                let catalog = query_catalog(client, selector).await?;
                let values = catalog.results.iter().filter_map(|entry| {
                    entry
                        .meta_tags
                        .iter()
                        .find(|tag| tag.key == *key)
                        .map(|tag| tag.value.clone())
                });
                Ok(distinct_suggestions(values))
            }
            Self::Metrics { selector } => {
                let catalog = query_catalog(client, selector).await?;
                Ok(distinct_suggestions(
                    catalog.results.iter().map(|entry| entry.name.clone()),
                ))
            }
            Self::Values { key, selector } => {
                let (start, end) = range.map(|r| (r.start, r.end)).unwrap_or((0, 0));

                // Completions for "<selector> <key>=" with the cursor at
                // the end of the appended key.
                let query = format!("{selector} {key}=");
                let pos = query.len();
                let request = AutocompleteRequest::values(&query, pos, start, end);
                let response: AutocompleteResponse =
                    client.post(AUTOCOMPLETE_PATH, &request).await?;

                let items = response
                    .suggestions
                    .first()
                    .map(|section| section.items.as_slice())
                    .unwrap_or(&[]);
                Ok(items
                    .iter()
                    .map(|item| Suggestion {
                        text: item.display.clone(),
                        expandable: false,
                    })
                    .collect())
            }
        }
    }
}

async fn query_catalog(
    client: &SumoClient,
    selector: &str,
) -> Result<CatalogQueryResponse, DatasourceError> {
    let request = CatalogQueryRequest::for_selector(selector);
    client.post(CATALOG_QUERY_PATH, &request).await
}

/// Deduplicate by exact text, keeping first-seen order.
fn distinct_suggestions(values: impl Iterator<Item = String>) -> Vec<Suggestion> {
    let mut seen = HashSet::new();
    let mut suggestions = Vec::new();
    for value in values {
        if seen.insert(value.clone()) {
            suggestions.push(Suggestion {
                text: value,
                expandable: true,
            });
        }
    }
    suggestions
}
