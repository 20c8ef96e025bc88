pub mod connection_pool;
pub mod migrations;
pub mod sqlite_repository;

pub use connection_pool::ConnectionPool;
pub use migrations::{LATEST_VERSION, MigrationError, MigrationOutcome};
pub use sqlite_repository::SqliteRepository;
