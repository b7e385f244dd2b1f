use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::DatasourceError;

/// Connection settings for one configured Sumo Logic datasource.
///
/// One instance of the adapter exists per configured datasource in the
/// host; the configuration is owned for the adapter's whole lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// Base URL of the Sumo Logic API deployment.
    pub url: String,
    /// Pre-computed `Authorization` header value, e.g. `Basic …`, as the
    /// host hands it over.
    pub auth_header: Option<String>,
    /// Basic-auth mode: requests are marked to be sent with credentials.
    pub basic_auth: bool,
    /// Per-request timeout. A hung backend fails the call instead of
    /// leaving it pending indefinitely.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            url: String::from("https://api.sumologic.com"),
            auth_header: None,
            basic_auth: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DatasourceConfig {
    /// Load configuration from `datasource.toml` and `SUMO_`-prefixed
    /// environment variables, layered over the defaults.
    pub fn load() -> Result<Self, DatasourceError> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("datasource.toml"))
            .merge(Env::prefixed("SUMO_"))
            .extract()?)
    }
}
