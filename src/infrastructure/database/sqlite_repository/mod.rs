use super::ConnectionPool;

mod kv_cache;
mod local_files;
mod mapper;
mod queries;
mod responses;
mod rows;
mod sync_queue;

/// 全リポジトリポートの SQLite 実装
pub struct SqliteRepository {
    pool: ConnectionPool,
}

impl SqliteRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}
