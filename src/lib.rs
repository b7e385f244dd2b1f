//! Sumo Logic metrics datasource adapter.
//!
//! Translates a dashboard host's query model into Sumo Logic metrics API
//! requests and reshapes the JSON responses back into flat time series.
//! The host's networking and template-variable substitution services stay
//! behind the [`transport::RequestDispatcher`] and
//! [`template::VariableResolver`] seams, so the adapter never opens sockets
//! or interprets variable syntax on its own.

pub mod config;
pub mod datasource;
pub mod error;
pub mod interval;
pub mod metadata;
pub mod query;
pub mod template;
pub mod transform;
pub mod transport;

pub use config::DatasourceConfig;
pub use datasource::{QueryResult, SumoDatasource, TestOutcome};
pub use error::{DatasourceError, RowError};
pub use metadata::{MetadataQuery, Suggestion};
pub use query::{QueryOptions, QueryTarget, TimeRange};
pub use transform::Series;
