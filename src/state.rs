use axum::extract::FromRef;

use crate::storage::Db;

/// 应用程序上下文
///
/// 连接池是唯一的共享状态，处理函数可以直接提取 `State<Db>`。
#[derive(Clone, FromRef)]
pub struct AppState {
    pool: Db,
}

impl AppState {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}
