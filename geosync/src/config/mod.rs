pub mod args;

mod env;
pub use env::{DATABASE_URL_VAR, Env, FauxEnv, LOG_FILTER_VAR, LOG_FORMAT_VAR, OsEnv};

mod error;
pub use error::{ConfigFileError, ConfigFileResult};

mod file;
pub use file::*;
