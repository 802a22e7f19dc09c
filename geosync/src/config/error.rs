use std::path::PathBuf;

pub type ConfigFileResult<T> = Result<T, ConfigFileError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] std::io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] subst::yaml::Error, PathBuf),

    #[error("Unable to load datasets file {1}: {0}")]
    DatasetsLoadError(#[source] std::io::Error, PathBuf),

    #[error("Unable to parse datasets file {1}: {0}")]
    DatasetsParseError(#[source] serde_yaml::Error, PathBuf),

    #[error("The postgres pool_size must be greater than or equal to 1")]
    PostgresPoolSizeInvalid,

    #[error(
        "A postgres connection string must be provided with --database-url, the DATABASE_URL environment variable or postgres.connection_string in the config file"
    )]
    PostgresConnectionStringMissing,
}
