//! The adapter surface the host calls.

use std::sync::Arc;

use serde::Serialize;
use sumo_api::{
    ANNOTATED_RESULTS_PATH, AUTOCOMPLETE_PATH, AutocompleteResponse, MetricsQueryRequest,
    MetricsQueryResponse, SuggestRequest,
};

use crate::config::DatasourceConfig;
use crate::error::DatasourceError;
use crate::interval::parse_interval;
use crate::metadata::{MetadataQuery, Suggestion};
use crate::query::{QueryOptions, TimeRange, build_rows};
use crate::template::{VariableResolver, scoped_bindings};
use crate::transform::{Series, transform_rows};
use crate::transport::{HttpDispatcher, RequestDispatcher, SumoClient};

/// Panel-refresh result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub data: Vec<Series>,
}

/// Outcome of a connection test, in the shape the host displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub status: String,
    pub message: String,
    pub title: String,
}

/// Adapter between the host's query model and the Sumo Logic metrics API.
///
/// One instance per configured datasource. All state is configuration;
/// time ranges and the quantization switch travel with each call, so
/// overlapping queries on one instance do not race.
pub struct SumoDatasource {
    client: SumoClient,
    resolver: Arc<dyn VariableResolver>,
}

impl SumoDatasource {
    /// Create a datasource backed by the reqwest dispatcher.
    pub fn new(
        config: DatasourceConfig,
        resolver: Arc<dyn VariableResolver>,
    ) -> Result<Self, DatasourceError> {
        let dispatcher = Arc::new(HttpDispatcher::new(config.timeout)?);
        Ok(Self::with_dispatcher(config, resolver, dispatcher))
    }

    /// Create a datasource with a caller-supplied dispatcher, typically
    /// the host's request proxy.
    pub fn with_dispatcher(
        config: DatasourceConfig,
        resolver: Arc<dyn VariableResolver>,
        dispatcher: Arc<dyn RequestDispatcher>,
    ) -> Self {
        tracing::info!(url = %config.url, "datasource created");
        Self {
            client: SumoClient::new(&config, dispatcher),
            resolver,
        }
    }

    /// Probe the backend with a `metrics|*` metadata query.
    pub async fn test_connection(&self) -> Result<TestOutcome, DatasourceError> {
        self.find_variable_values("metrics|*", None).await?;
        Ok(TestOutcome {
            status: "success".to_string(),
            message: "Data source is working".to_string(),
            title: "Success".to_string(),
        })
    }

    /// Resolve a template-variable query into suggestions.
    ///
    /// The optional range feeds the autocomplete (`values|`) path, which
    /// falls back to zero times without one; catalog paths ignore it.
    pub async fn find_variable_values(
        &self,
        query: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<Suggestion>, DatasourceError> {
        let scoped = scoped_bindings(self.resolver.as_ref());
        let interpolated = self.resolver.replace(query, &scoped)?;

        let parsed = MetadataQuery::parse(&interpolated)
            .map_err(|_| DatasourceError::UnknownMetricFindQuery(query.to_string()))?;
        parsed.resolve(&self.client, range).await
    }

    /// Execute a panel refresh: one batched request for every eligible
    /// target, reshaped into flat series.
    pub async fn run_query(&self, options: &QueryOptions) -> Result<QueryResult, DatasourceError> {
        options.range.validate()?;

        // Always computed; a malformed interval is an input error even
        // when the hint is not sent.
        let desired_quantization = parse_interval(&options.interval)?;

        let targets = options.eligible_targets();
        let rows = build_rows(options, self.resolver.as_ref())?;

        // Nothing to ask: skip the round trip entirely.
        if rows.is_empty() {
            return Ok(QueryResult { data: Vec::new() });
        }

        let request = MetricsQueryRequest {
            query: rows,
            start_time: options.range.start,
            end_time: options.range.end,
            max_data_points: options.max_data_points,
            requested_data_points: options.requested_data_points(),
            desired_quantization_in_secs: options.quantization.then_some(desired_quantization),
        };

        tracing::debug!(
            rows = request.query.len(),
            start = request.start_time,
            end = request.end_time,
            "running metrics query"
        );

        let response: MetricsQueryResponse =
            self.client.post(ANNOTATED_RESULTS_PATH, &request).await?;
        let data = transform_rows(&targets, &response.response)?;
        Ok(QueryResult { data })
    }

    /// Query-editor autocomplete for a partially typed query, with the
    /// cursor at its end.
    pub async fn suggest(
        &self,
        partial_query: &str,
        range: TimeRange,
    ) -> Result<Vec<String>, DatasourceError> {
        let request = SuggestRequest {
            query: partial_query.to_string(),
            pos: partial_query.len(),
            query_start_time: range.start,
            query_end_time: range.end,
        };
        let response: AutocompleteResponse = self.client.post(AUTOCOMPLETE_PATH, &request).await?;

        let mut completions = Vec::new();
        for section in &response.suggestions {
            for item in &section.items {
                if let Some(replacement) = &item.replacement {
                    completions.push(replacement.text.clone());
                }
            }
        }
        Ok(completions)
    }
}
