use thiserror::Error;

/// Unified error surface of the adapter. Every operation rejects with one
/// of these; nothing is retried internally.
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// The requested range ends before it starts.
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: i64, end: i64 },

    /// Interval strings must match `<integer><unit>` exactly.
    #[error("malformed interval {0:?}: expected <integer><unit> with unit one of ms, s, m, h, d, w, M, y")]
    MalformedInterval(String),

    /// The template-variable query used an unrecognized prefix.
    #[error("unknown metric find query: {0}")]
    UnknownMetricFindQuery(String),

    /// Propagated verbatim from the template substitution collaborator.
    #[error("template substitution failed: {0}")]
    Substitution(String),

    /// The backend answered with a structured error body.
    #[error("Sumo Logic error: {message}")]
    Backend {
        message: String,
        body: String,
        url: String,
    },

    /// Transport-level failure. Status 0 means no HTTP response arrived
    /// at all.
    #[error("network error: {reason} ({status})")]
    Network {
        status: u16,
        reason: String,
        body: String,
        url: String,
    },

    /// One or more rows of a query response reported a backend-side error.
    /// No partial series are surfaced in that case.
    #[error("{}", join_messages(.errors))]
    SeriesTransform { errors: Vec<RowError> },

    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}

/// Backend-reported failure for a single query row, keyed by the reference
/// id of the target that produced the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub ref_id: String,
    pub message: String,
}

fn join_messages(errors: &[RowError]) -> String {
    errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
