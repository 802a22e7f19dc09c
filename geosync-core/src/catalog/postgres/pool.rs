use deadpool_postgres::tokio_postgres::config::SslMode;
use deadpool_postgres::tokio_postgres::{Config, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use semver::Version;
use tracing::{info, warn};

use crate::catalog::CatalogError::{
    BadConnectionString, BadPostgisVersion, BadPostgresVersion, PostgisNotEnabled, PostgisTooOld,
    PostgresError, PostgresPoolBuildError, PostgresPoolConnError, PostgresqlTooOld,
};
use crate::catalog::CatalogResult;

/// Oldest `PostgreSQL` the catalog schema is tested with.
const MINIMUM_POSTGRES_VERSION: Version = Version::new(11, 0, 0);
/// Oldest `PostGIS` the catalog schema is tested with.
const MINIMUM_POSTGIS_VERSION: Version = Version::new(3, 0, 0);
/// Oldest version still receiving upstream fixes.
const RECOMMENDED_POSTGRES_VERSION: Version = Version::new(13, 0, 0);

/// Default number of pooled connections.
pub const POOL_SIZE_DEFAULT: usize = 4;

/// `PostgreSQL` connection pool with `PostGIS` support.
#[derive(Clone, Debug)]
pub struct PostgresPool {
    id: String,
    pool: Pool,
}

impl PostgresPool {
    /// Connect and check that the server is recent enough.
    ///
    /// A database without the `postgis` extension is accepted with a warning,
    /// so that [`initialize`](crate::catalog::CatalogStore::initialize) can enable it.
    /// Connections are made without TLS. An `sslmode` other than `disable` or `prefer`
    /// makes connecting fail.
    pub async fn new(connection_string: &str, pool_size: usize) -> CatalogResult<Self> {
        let (id, mgr) = Self::parse_config(connection_string)?;
        let pool = Pool::builder(mgr)
            .max_size(pool_size)
            .build()
            .map_err(|e| PostgresPoolBuildError(e, id.clone()))?;
        let res = Self { id, pool };

        let conn = res.get().await?;
        let pg_ver = get_postgres_version(&conn).await?;
        if pg_ver < MINIMUM_POSTGRES_VERSION {
            return Err(PostgresqlTooOld(pg_ver, MINIMUM_POSTGRES_VERSION));
        }
        if pg_ver < RECOMMENDED_POSTGRES_VERSION {
            warn!(
                "PostgreSQL {pg_ver} is older than the recommended minimum {RECOMMENDED_POSTGRES_VERSION}."
            );
        }
        match check_postgis_version(&conn).await? {
            Some(postgis_ver) => info!(
                "Connected to PostgreSQL {pg_ver} / PostGIS {postgis_ver} for catalog {}",
                res.id
            ),
            None => warn!(
                "Connected to PostgreSQL {pg_ver} for catalog {}, but PostGIS is not enabled yet. Initialize the catalog to enable it.",
                res.id
            ),
        }
        Ok(res)
    }

    /// Version of the enabled `postgis` extension, failing if it is missing or too old.
    pub async fn require_postgis(&self) -> CatalogResult<Version> {
        let conn = self.get().await?;
        check_postgis_version(&conn)
            .await?
            .ok_or_else(|| PostgisNotEnabled(self.id.clone()))
    }

    fn parse_config(connection_string: &str) -> CatalogResult<(String, Manager)> {
        let pg_cfg: Config = connection_string
            .parse()
            .map_err(|e| BadConnectionString(e, connection_string.to_string()))?;

        let id = pg_cfg.get_dbname().map_or_else(
            || format!("{:?}", pg_cfg.get_hosts().first()),
            ToString::to_string,
        );
        if pg_cfg.get_ssl_mode() != SslMode::Disable {
            info!("TLS is not supported, connecting without it: {pg_cfg:?}");
        }

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        Ok((id, Manager::from_config(pg_cfg, NoTls, mgr_config)))
    }

    /// Retrieves an [`Object`] from this pool or waits for one to become available.
    pub async fn get(&self) -> CatalogResult<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| PostgresPoolConnError(e, self.id.clone()))
    }

    /// Database name, or host if the connection string has none.
    #[must_use]
    pub fn get_id(&self) -> &str {
        &self.id
    }
}

/// `PostgreSQL` only has Major.Minor versioning, so the patch version is always 0.
async fn get_postgres_version(conn: &Object) -> CatalogResult<Version> {
    let version: String = conn
        .query_one(
            r"
SELECT (regexp_matches(
           current_setting('server_version'),
           '^(\d+\.\d+)',
           'g'
       ))[1] || '.0' as version;",
            &[],
        )
        .await
        .map(|row| row.get("version"))
        .map_err(|e| PostgresError(e, "querying postgres version"))?;

    version
        .parse()
        .map_err(|e| BadPostgresVersion(e, version))
}

/// `None` when the extension is not enabled in the current database.
async fn check_postgis_version(conn: &Object) -> CatalogResult<Option<Version>> {
    let Some(row) = conn
        .query_opt(
            "SELECT extversion FROM pg_extension WHERE extname = 'postgis'",
            &[],
        )
        .await
        .map_err(|e| PostgresError(e, "querying postgis version"))?
    else {
        return Ok(None);
    };
    let version: String = row.get("extversion");
    let parsed = parse_postgis_version(&version).map_err(|e| BadPostgisVersion(e, version))?;
    if parsed < MINIMUM_POSTGIS_VERSION {
        return Err(PostgisTooOld(parsed, MINIMUM_POSTGIS_VERSION));
    }
    Ok(Some(parsed))
}

/// Extension versions may carry a suffix such as `3.5.0dev` or `3.4.2 r1234`.
fn parse_postgis_version(version: &str) -> Result<Version, semver::Error> {
    let end = version
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(version.len());
    version[..end].parse()
}

#[cfg(all(test, feature = "test-pg"))]
mod tests {
    use testcontainers_modules::postgres::Postgres;
    use testcontainers_modules::testcontainers::ImageExt as _;
    use testcontainers_modules::testcontainers::runners::AsyncRunner as _;

    use super::*;

    #[tokio::test]
    async fn connects_without_postgis() {
        let node = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .expect("container launched");
        let conn_str = format!(
            "postgres://postgres:postgres@{}:{}/postgres",
            node.get_host().await.unwrap(),
            node.get_host_port_ipv4(5432).await.unwrap()
        );
        let pool = PostgresPool::new(&conn_str, 1).await.unwrap();
        let err = pool.require_postgis().await.unwrap_err();
        assert!(matches!(err, PostgisNotEnabled(id) if id == "postgres"));
    }

    #[rstest::rstest]
    #[case("3.4.2", Version::new(3, 4, 2))]
    #[case("3.5.0dev", Version::new(3, 5, 0))]
    #[case("3.1.4 r1234", Version::new(3, 1, 4))]
    fn postgis_versions(#[case] text: &str, #[case] expected: Version) {
        assert_eq!(parse_postgis_version(text).unwrap(), expected);
    }

    #[test]
    fn bad_connection_string() {
        let res = PostgresPool::parse_config("postgres://user@host:notaport/db");
        assert!(matches!(res, Err(BadConnectionString(..))));
    }
}
