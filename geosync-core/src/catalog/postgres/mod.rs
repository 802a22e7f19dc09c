mod ewkb;

mod pool;
pub use pool::{POOL_SIZE_DEFAULT, PostgresPool};

mod schema;
pub use schema::SCHEMA;

mod store;
pub use store::PostgresCatalog;
