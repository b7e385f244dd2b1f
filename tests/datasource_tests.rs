//! End-to-end adapter tests against a recording fake dispatcher.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

use sumo_datasource::error::DatasourceError;
use sumo_datasource::template::{ScopedVars, StaticVariables};
use sumo_datasource::transport::{ProxyRequest, ProxyResponse, RequestDispatcher};
use sumo_datasource::{DatasourceConfig, QueryOptions, QueryTarget, SumoDatasource, TimeRange};

/// Dispatcher returning canned responses while recording every request.
#[derive(Default)]
struct FakeDispatcher {
    requests: Mutex<Vec<ProxyRequest>>,
    responses: Mutex<Vec<Result<ProxyResponse, DatasourceError>>>,
}

impl FakeDispatcher {
    fn with_response(status: u16, status_text: &str, body: Value) -> Arc<Self> {
        let fake = Arc::new(Self::default());
        fake.push_response(status, status_text, body);
        fake
    }

    fn push_response(&self, status: u16, status_text: &str, body: Value) {
        self.responses.lock().unwrap().push(Ok(ProxyResponse {
            status,
            status_text: status_text.to_string(),
            body: body.to_string(),
        }));
    }

    fn push_failure(&self, error: DatasourceError) {
        self.responses.lock().unwrap().push(Err(error));
    }

    fn requests(&self) -> Vec<ProxyRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn request_body(&self, index: usize) -> Value {
        serde_json::from_str(&self.requests()[index].body).unwrap()
    }
}

#[async_trait]
impl RequestDispatcher for FakeDispatcher {
    async fn dispatch(&self, request: ProxyRequest) -> Result<ProxyResponse, DatasourceError> {
        self.requests.lock().unwrap().push(request);
        self.responses.lock().unwrap().remove(0)
    }
}

fn datasource(dispatcher: Arc<FakeDispatcher>, vars: &[(&str, &str)]) -> SumoDatasource {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut variables = StaticVariables::default();
    for (name, value) in vars {
        variables.set(name, value);
    }
    let config = DatasourceConfig {
        url: "https://api.sumologic.test".to_string(),
        auth_header: Some("Basic dXNlcjpwYXNz".to_string()),
        basic_auth: true,
        ..DatasourceConfig::default()
    };
    SumoDatasource::with_dispatcher(config, Arc::new(variables), dispatcher)
}

fn options(targets: Vec<QueryTarget>) -> QueryOptions {
    QueryOptions {
        range: TimeRange::new(1_600_000_000_000, 1_600_000_600_000),
        targets,
        scoped_vars: ScopedVars::new(),
        panel_id: 5,
        max_data_points: 1000,
        interval: "30s".to_string(),
        quantization: false,
    }
}

fn catalog_response(entries: Value) -> Value {
    json!({ "results": entries })
}

#[tokio::test]
async fn run_query_posts_one_batched_request() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        json!({
            "response": [{
                "rowId": "5A",
                "results": [{
                    "metric": {
                        "dimensions": [
                            {"key": "host", "value": "web-1", "legend": true},
                            {"key": "_sourceCategory", "value": "forge"}
                        ]
                    },
                    "datapoints": {"value": [0.5, 0.75], "timestamp": [1000.0, 2000.0]}
                }]
            }]
        }),
    );
    let ds = datasource(dispatcher.clone(), &[]);

    let result = ds
        .run_query(&options(vec![QueryTarget::new("metric=CPU_LoadAvg_1min", "A")]))
        .await?;

    let requests = dispatcher.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.url,
        "https://api.sumologic.test/api/v1/metrics/annotated/results"
    );
    assert_eq!(request.content_type, "application/json");
    assert_eq!(request.authorization.as_deref(), Some("Basic dXNlcjpwYXNz"));
    assert!(request.with_credentials);

    let body = dispatcher.request_body(0);
    assert_eq!(
        body["query"],
        json!([{"query": "metric=CPU_LoadAvg_1min", "rowId": "5A"}])
    );
    assert_eq!(body["startTime"], 1_600_000_000_000_i64);
    assert_eq!(body["endTime"], 1_600_000_600_000_i64);
    assert_eq!(body["maxDataPoints"], 1000);
    assert_eq!(body["requestedDataPoints"], 167);
    assert!(body.get("desiredQuantizationInSecs").is_none());

    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].name, "host=web-1");
    assert_eq!(result.data[0].datapoints, vec![(0.5, 1000.0), (0.75, 2000.0)]);
    Ok(())
}

#[tokio::test]
async fn run_query_includes_quantization_when_enabled() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(200, "OK", json!({"response": []}));
    let ds = datasource(dispatcher.clone(), &[]);

    let mut opts = options(vec![QueryTarget::new("metric=CPU", "A")]);
    opts.quantization = true;
    opts.interval = "2m".to_string();
    ds.run_query(&opts).await?;

    let body = dispatcher.request_body(0);
    assert_eq!(body["desiredQuantizationInSecs"], 120);
    Ok(())
}

#[tokio::test]
async fn run_query_without_eligible_targets_skips_the_network() -> Result<()> {
    let dispatcher = Arc::new(FakeDispatcher::default());
    let ds = datasource(dispatcher.clone(), &[]);

    let hidden = QueryTarget {
        hide: true,
        ..QueryTarget::new("metric=CPU", "A")
    };
    let result = ds
        .run_query(&options(vec![hidden, QueryTarget::new("", "B")]))
        .await?;

    assert!(result.data.is_empty());
    assert!(dispatcher.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn run_query_rejects_inverted_time_range_before_dispatch() {
    let dispatcher = Arc::new(FakeDispatcher::default());
    let ds = datasource(dispatcher.clone(), &[]);

    let mut opts = options(vec![QueryTarget::new("metric=CPU", "A")]);
    opts.range = TimeRange::new(2_000, 1_000);
    let error = ds.run_query(&opts).await.unwrap_err();

    assert!(matches!(
        error,
        DatasourceError::InvalidTimeRange { start: 2_000, end: 1_000 }
    ));
    assert!(dispatcher.requests().is_empty());
}

#[tokio::test]
async fn run_query_rejects_malformed_interval() {
    let dispatcher = Arc::new(FakeDispatcher::default());
    let ds = datasource(dispatcher.clone(), &[]);

    let mut opts = options(vec![QueryTarget::new("metric=CPU", "A")]);
    opts.interval = "abc".to_string();
    let error = ds.run_query(&opts).await.unwrap_err();

    assert!(matches!(error, DatasourceError::MalformedInterval(_)));
    assert!(dispatcher.requests().is_empty());
}

#[tokio::test]
async fn run_query_fails_whole_call_when_any_row_errors() {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        json!({
            "response": [
                {
                    "rowId": "5A",
                    "results": [{
                        "metric": {"dimensions": [{"key": "host", "value": "web-1", "legend": true}]},
                        "datapoints": {"value": [1.0], "timestamp": [1000.0]}
                    }]
                },
                {"rowId": "5B", "messageType": "error", "message": "no such metric"}
            ]
        }),
    );
    let ds = datasource(dispatcher, &[]);

    let error = ds
        .run_query(&options(vec![
            QueryTarget::new("metric=CPU", "A"),
            QueryTarget::new("metric=Bogus", "B"),
        ]))
        .await
        .unwrap_err();

    match error {
        DatasourceError::SeriesTransform { ref errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].ref_id, "B");
        }
        ref other => panic!("expected SeriesTransform, got {other:?}"),
    }
    assert!(error.to_string().contains("no such metric"));
}

#[tokio::test]
async fn find_variable_values_dimensions_dedups_in_first_seen_order() -> Result<()> {
    let entry = |value: &str| {
        json!({
            "name": "CPUUtilization",
            "dimensions": [
                {"key": "Statistic", "value": "Sum"},
                {"key": "DBInstanceIdentifier", "value": value}
            ],
            "metaTags": []
        })
    };
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        catalog_response(json!([entry("db-1"), entry("db-1"), entry("db-2")])),
    );
    let ds = datasource(dispatcher.clone(), &[]);

    let suggestions = ds
        .find_variable_values(
            "dimensions|DBInstanceIdentifier|namespace=AWS/RDS metric=CPUUtilization",
            None,
        )
        .await?;

    let requests = dispatcher.requests();
    assert_eq!(
        requests[0].url,
        "https://api.sumologic.test/api/v1/metrics/meta/catalog/query"
    );
    assert_eq!(
        dispatcher.request_body(0),
        json!({
            "query": "namespace=AWS/RDS metric=CPUUtilization",
            "offset": 0,
            "limit": 100000
        })
    );

    let texts: Vec<_> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["db-1", "db-2"]);
    assert!(suggestions.iter().all(|s| s.expandable));
    Ok(())
}

#[tokio::test]
async fn find_variable_values_dimensions_trims_the_key() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        catalog_response(json!([{
            "name": "CPUUtilization",
            "dimensions": [{"key": "DBInstanceIdentifier", "value": "db-1"}],
            "metaTags": []
        }])),
    );
    let ds = datasource(dispatcher, &[]);

    let suggestions = ds
        .find_variable_values("dimensions| DBInstanceIdentifier |namespace=AWS/RDS", None)
        .await?;
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].text, "db-1");
    Ok(())
}

#[tokio::test]
async fn find_variable_values_metatags_scans_meta_tags() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        catalog_response(json!([
            {
                "name": "CPU_LoadAvg_1min",
                "dimensions": [],
                "metaTags": [{"key": "_sourceCategory", "value": "forge"}]
            },
            {
                "name": "CPU_LoadAvg_5min",
                "dimensions": [],
                "metaTags": [{"key": "_sourceCategory", "value": "alert"}]
            }
        ])),
    );
    let ds = datasource(dispatcher, &[]);

    let suggestions = ds
        .find_variable_values("metaTags|_sourceCategory|_contentType=HostMetrics", None)
        .await?;
    let texts: Vec<_> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["forge", "alert"]);
    Ok(())
}

#[tokio::test]
async fn find_variable_values_metrics_lists_distinct_names() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        catalog_response(json!([
            {"name": "Disk_WriteBytes", "dimensions": [], "metaTags": []},
            {"name": "Disk_WriteBytes", "dimensions": [], "metaTags": []},
            {"name": "Disk_InodesAvailable", "dimensions": [], "metaTags": []}
        ])),
    );
    let ds = datasource(dispatcher, &[]);

    let suggestions = ds
        .find_variable_values("metrics|_contentType=HostMetrics", None)
        .await?;
    let texts: Vec<_> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Disk_WriteBytes", "Disk_InodesAvailable"]);
    Ok(())
}

#[tokio::test]
async fn find_variable_values_values_uses_the_autocomplete_endpoint() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        json!({
            "suggestions": [{
                "sectionName": "Values",
                "items": [
                    {"display": "alert", "replacement": {"text": "alert"}},
                    {"display": "analytics", "replacement": {"text": "analytics"}}
                ]
            }]
        }),
    );
    let ds = datasource(dispatcher.clone(), &[]);

    let range = TimeRange::new(10, 20);
    let suggestions = ds
        .find_variable_values(
            "values|_sourceCategory|_contentType=HostMetrics metric=CPU_LoadAvg_1Min",
            Some(range),
        )
        .await?;

    let requests = dispatcher.requests();
    assert_eq!(
        requests[0].url,
        "https://api.sumologic.test/api/v1/metrics/suggest/autocomplete"
    );
    let expected_query = "_contentType=HostMetrics metric=CPU_LoadAvg_1Min _sourceCategory=";
    let body = dispatcher.request_body(0);
    assert_eq!(body["query"], expected_query);
    assert_eq!(body["pos"], expected_query.len());
    assert_eq!(body["queryId"], "1");
    assert_eq!(body["apiVersion"], "0.2.0");
    assert_eq!(body["queryStartTime"], 10);
    assert_eq!(body["queryEndTime"], 20);
    assert_eq!(body["requestedSectionsAndCounts"], json!({"values": 1000}));

    let texts: Vec<_> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["alert", "analytics"]);
    assert!(suggestions.iter().all(|s| !s.expandable));
    Ok(())
}

#[tokio::test]
async fn find_variable_values_without_range_sends_zero_times() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(200, "OK", json!({"suggestions": []}));
    let ds = datasource(dispatcher.clone(), &[]);

    ds.find_variable_values("values|_sourceCategory|metric=CPU", None)
        .await?;

    let body = dispatcher.request_body(0);
    assert_eq!(body["queryStartTime"], 0);
    assert_eq!(body["queryEndTime"], 0);
    Ok(())
}

#[tokio::test]
async fn find_variable_values_substitutes_template_variables() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(200, "OK", catalog_response(json!([])));
    let ds = datasource(dispatcher.clone(), &[("namespace", "AWS/RDS")]);

    ds.find_variable_values("dimensions|DBInstanceIdentifier|namespace=$namespace", None)
        .await?;

    let body = dispatcher.request_body(0);
    assert_eq!(body["query"], "namespace=AWS/RDS");
    Ok(())
}

#[tokio::test]
async fn find_variable_values_rejects_unknown_queries_with_original_text() {
    let dispatcher = Arc::new(FakeDispatcher::default());
    let ds = datasource(dispatcher.clone(), &[]);

    for query in ["bogus|x", ""] {
        let error = ds.find_variable_values(query, None).await.unwrap_err();
        assert!(
            matches!(error, DatasourceError::UnknownMetricFindQuery(ref text) if text == query),
            "expected UnknownMetricFindQuery carrying {query:?}"
        );
    }
    assert!(dispatcher.requests().is_empty());
}

#[tokio::test]
async fn suggest_flattens_replacement_texts_across_sections() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        json!({
            "suggestions": [
                {"sectionName": "Matches", "items": [{"display": "a", "replacement": {"text": "metric=CPU_LoadAvg_1min"}}]},
                {"sectionName": "Tokens", "items": [{"display": "b", "replacement": {"text": "metric=CPU_LoadAvg_5min"}}]}
            ]
        }),
    );
    let ds = datasource(dispatcher.clone(), &[]);

    let completions = ds
        .suggest("metric=CPU", TimeRange::new(100, 200))
        .await?;

    let body = dispatcher.request_body(0);
    assert_eq!(
        body,
        json!({
            "query": "metric=CPU",
            "pos": 10,
            "queryStartTime": 100,
            "queryEndTime": 200
        })
    );
    assert_eq!(
        completions,
        vec!["metric=CPU_LoadAvg_1min", "metric=CPU_LoadAvg_5min"]
    );
    Ok(())
}

#[tokio::test]
async fn test_connection_probes_the_metrics_catalog() -> Result<()> {
    let dispatcher = FakeDispatcher::with_response(
        200,
        "OK",
        catalog_response(json!([{"name": "CPU_LoadAvg_1min", "dimensions": [], "metaTags": []}])),
    );
    let ds = datasource(dispatcher.clone(), &[]);

    let outcome = ds.test_connection().await?;
    assert_eq!(outcome.status, "success");
    assert_eq!(outcome.message, "Data source is working");
    assert_eq!(outcome.title, "Success");

    let body = dispatcher.request_body(0);
    assert_eq!(body["query"], "*");
    Ok(())
}

#[tokio::test]
async fn structured_backend_errors_are_surfaced() {
    let dispatcher = FakeDispatcher::with_response(
        400,
        "Bad Request",
        json!({"error": "parse error in selector"}),
    );
    let ds = datasource(dispatcher, &[]);

    let error = ds
        .run_query(&options(vec![QueryTarget::new("metric=CPU", "A")]))
        .await
        .unwrap_err();
    match error {
        DatasourceError::Backend { message, .. } => {
            assert_eq!(message, "parse error in selector");
        }
        other => panic!("expected Backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn unstructured_backend_errors_become_network_errors() {
    let dispatcher = FakeDispatcher::with_response(502, "Bad Gateway", json!("upstream down"));
    let ds = datasource(dispatcher, &[]);

    let error = ds
        .run_query(&options(vec![QueryTarget::new("metric=CPU", "A")]))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        DatasourceError::Network { status: 502, .. }
    ));
}

#[tokio::test]
async fn status_zero_transport_failures_propagate() {
    let dispatcher = Arc::new(FakeDispatcher::default());
    dispatcher.push_failure(DatasourceError::Network {
        status: 0,
        reason: "connection refused".to_string(),
        body: String::new(),
        url: "https://api.sumologic.test/api/v1/metrics/annotated/results".to_string(),
    });
    let ds = datasource(dispatcher, &[]);

    let error = ds
        .run_query(&options(vec![QueryTarget::new("metric=CPU", "A")]))
        .await
        .unwrap_err();
    assert!(matches!(error, DatasourceError::Network { status: 0, .. }));
}
