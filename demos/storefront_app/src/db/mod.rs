// storefront_app/src/db/mod.rs

//! PostgreSQL implementations of the fulfillment store contracts.

pub mod catalog;
pub mod grants;
pub mod orders;

pub use catalog::PgDesignFileCatalog;
pub use grants::PgGrantStore;
pub use orders::PgOrderStore;

use fulfillment::FulfillmentError;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
  PgPoolOptions::new().max_connections(10).connect(database_url).await
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
  sqlx::migrate!("./migrations").run(pool).await
}

pub(crate) fn db_error(err: sqlx::Error) -> FulfillmentError {
  FulfillmentError::persistence(err)
}
