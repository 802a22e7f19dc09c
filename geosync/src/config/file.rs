use std::fs::{self, File};
use std::io::Read as _;
use std::path::Path;
use std::time::Duration;

use geosync_core::catalog::CatalogPolicies;
use geosync_core::catalog::postgres::POOL_SIZE_DEFAULT;
use geosync_core::remote::{ClientOptions, DEFAULT_TIMEOUT};
use geosync_core::styles::ColormapMode;
use geosync_core::sync::{
    CatalogConfig, DEFAULT_LEASE_TTL, DatasetConfig, RefreshOptions, UnrecognizedValues,
};
use serde::{Deserialize, Serialize};
use subst::VariableMap;
use tracing::warn;

use crate::config::{ConfigFileError, ConfigFileResult};

/// The configuration file: where to store the catalog, how to reach remote APIs,
/// and which datasets to mirror.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub policies: CatalogPolicies,
    #[serde(default)]
    pub styles: StylesConfig,
    /// Remote APIs to mirror.
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub connection_string: Option<String>,
    /// Maximum number of pooled connections [DEFAULT: 4]
    pub pool_size: Option<usize>,
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Bound on every remote request, e.g. "30s" or "2m" [DEFAULT: 30s]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Hold a lease in the catalog while refreshing, so runs never overlap [DEFAULT: true]
    pub lease: Option<bool>,
    /// Lease expiry for runs that die without releasing it [DEFAULT: 15m]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub lease_ttl: Option<Duration>,
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Handling of property values outside of a colormap's domain.
    #[serde(default)]
    pub colormap_mode: ColormapMode,
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Config {
    /// Dotted paths of every key that was not understood.
    #[must_use]
    pub fn get_unrecognized_keys(&self) -> Vec<String> {
        let sections = [
            ("", &self.unrecognized),
            ("postgres.", &self.postgres.unrecognized),
            ("remote.", &self.remote.unrecognized),
            ("refresh.", &self.refresh.unrecognized),
            ("styles.", &self.styles.unrecognized),
        ];
        let mut keys: Vec<String> = sections
            .into_iter()
            .flat_map(|(prefix, values)| values.keys().map(move |k| format!("{prefix}{k}")))
            .collect();
        keys.extend(self.catalog().unrecognized_keys());
        keys
    }

    /// Warn about unrecognized keys and validate values.
    pub fn finalize(&self) -> ConfigFileResult<()> {
        for key in self.get_unrecognized_keys() {
            warn!(
                "Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos."
            );
        }
        if self.postgres.pool_size == Some(0) {
            return Err(ConfigFileError::PostgresPoolSizeInvalid);
        }
        Ok(())
    }

    /// The datasets to mirror.
    #[must_use]
    pub fn catalog(&self) -> CatalogConfig {
        CatalogConfig {
            datasets: self.datasets.clone(),
        }
    }

    pub fn connection_string(&self) -> ConfigFileResult<&str> {
        self.postgres
            .connection_string
            .as_deref()
            .ok_or(ConfigFileError::PostgresConnectionStringMissing)
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.postgres.pool_size.unwrap_or(POOL_SIZE_DEFAULT)
    }

    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions {
            timeout: Some(self.remote.timeout.unwrap_or(DEFAULT_TIMEOUT)),
            ..ClientOptions::default()
        };
        if let Some(user_agent) = &self.remote.user_agent {
            options.user_agent.clone_from(user_agent);
        }
        options
    }

    #[must_use]
    pub fn refresh_options(&self) -> RefreshOptions {
        let lease_ttl = if self.refresh.lease.unwrap_or(true) {
            Some(self.refresh.lease_ttl.unwrap_or(DEFAULT_LEASE_TTL))
        } else {
            None
        };
        RefreshOptions { lease_ttl }
    }
}

/// Read a config file, substituting `${VAR}` references from `env`.
pub fn read_config<'a, M>(file_name: &Path, env: &'a M) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    let mut file =
        File::open(file_name).map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, env, file_name)
}

pub fn parse_config<'a, M>(contents: &str, env: &'a M, file_name: &Path) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    subst::yaml::from_str(contents, env)
        .map_err(|e| ConfigFileError::ConfigParseError(e, file_name.into()))
}

/// Read a standalone `{"datasets": [...]}` document. JSON and YAML are both accepted.
pub fn read_datasets(file_name: &Path) -> ConfigFileResult<CatalogConfig> {
    let contents = fs::read_to_string(file_name)
        .map_err(|e| ConfigFileError::DatasetsLoadError(e, file_name.into()))?;
    serde_yaml::from_str(&contents)
        .map_err(|e| ConfigFileError::DatasetsParseError(e, file_name.into()))
}
