//! The environment variables geosync reads.
//!
//! These are the `${VAR}` references of the config file, the `DATABASE_URL` fallback
//! connection string, and the `RUST_LOG` and `GEOSYNC_LOG_FORMAT` logging controls.
//! Both implementations remember which variables the config file referenced.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::env::{self, VarError};

use subst::VariableMap;
use tracing::warn;

/// Connection string used when neither the CLI nor the config file sets one.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Log level filter.
pub const LOG_FILTER_VAR: &str = "RUST_LOG";
/// Log output format, see [`LogFormat`](crate::logging::LogFormat).
pub const LOG_FORMAT_VAR: &str = "GEOSYNC_LOG_FORMAT";

/// Source of environment variables, usable for `${VAR}` substitution.
pub trait Env<'a>: VariableMap<'a, Value = String> {
    /// Value of `key`, or `None` if it is unset or not valid Unicode.
    fn value(&self, key: &str) -> Option<String>;

    /// Whether the config file referenced `key`.
    fn is_referenced(&self, key: &str) -> bool;

    #[must_use]
    fn database_url(&self) -> Option<String> {
        self.value(DATABASE_URL_VAR)
    }

    /// `DATABASE_URL` is set, but the config file does not use it.
    #[must_use]
    fn database_url_ignored(&self) -> bool {
        !self.is_referenced(DATABASE_URL_VAR) && self.database_url().is_some()
    }

    #[must_use]
    fn log_filter(&self) -> Option<String> {
        self.value(LOG_FILTER_VAR)
    }

    #[must_use]
    fn log_format(&self) -> Option<String> {
        self.value(LOG_FORMAT_VAR)
    }
}

/// The process environment.
#[derive(Debug, Default)]
pub struct OsEnv {
    referenced: RefCell<BTreeSet<String>>,
}

impl Env<'_> for OsEnv {
    fn value(&self, key: &str) -> Option<String> {
        match env::var(key) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(value)) => {
                warn!(
                    "Ignoring environment variable {key}, its value {} is not valid Unicode",
                    value.to_string_lossy()
                );
                None
            }
        }
    }

    fn is_referenced(&self, key: &str) -> bool {
        self.referenced.borrow().contains(key)
    }
}

impl<'a> VariableMap<'a> for OsEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        self.referenced.borrow_mut().insert(key.to_string());
        self.value(key)
    }
}

/// A fixed set of variables.
#[derive(Debug, Default)]
pub struct FauxEnv {
    vars: BTreeMap<String, String>,
    referenced: RefCell<BTreeSet<String>>,
}

impl FauxEnv {
    #[must_use]
    pub fn new<const N: usize>(vars: [(&str, &str); N]) -> Self {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            referenced: RefCell::default(),
        }
    }
}

impl Env<'_> for FauxEnv {
    fn value(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn is_referenced(&self, key: &str) -> bool {
        self.referenced.borrow().contains(key)
    }
}

impl<'a> VariableMap<'a> for FauxEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        self.referenced.borrow_mut().insert(key.to_string());
        self.value(key)
    }
}
