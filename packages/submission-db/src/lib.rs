//! C2: data access layer.

pub mod postgres;
pub mod traits;

pub use postgres::PostgresDataAccess;
pub use traits::DataAccess;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("job {0} not found")]
    JobNotFound(uuid::Uuid),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
