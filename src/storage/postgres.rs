use sqlx::postgres::PgPoolOptions;

use crate::config::{AppConfig, PoolConfig};

/// 数据库连接池类型
pub type Db = sqlx::PgPool;

/// 根据 [`AppConfig`] 初始化数据库连接池
pub async fn init_db(config: &AppConfig) -> Result<Db, sqlx::Error> {
    new_db_pool(&config.database_url, &config.pool).await
}

/// 根据连接 URL 创建新的数据库连接池
///
/// 连接池配置见 [`PoolConfig`]：
///
/// - 最大空闲时间
/// - 最大生存时间
/// - 最大/最小连接数
/// - 获取连接超时
/// - 获取前测试连接
pub async fn new_db_pool(conn_url: &str, pool: &PoolConfig) -> Result<Db, sqlx::Error> {
    PgPoolOptions::new()
        .idle_timeout(pool.idle_timeout())
        .max_lifetime(pool.max_lifetime())
        .max_connections(pool.max_connections)
        .acquire_timeout(pool.acquire_timeout())
        .test_before_acquire(true)
        .min_connections(pool.min_connections)
        .connect(conn_url)
        .await
}

/// 执行 SQL 文件中的迁移语句
///
/// 将文件内容按 `;` 分割，每条 SQL 单独执行
pub async fn migrate(db: &Db, file: &str) -> Result<(), sqlx::Error> {
    let content = std::fs::read_to_string(file)?;

    for sql in content.split(';') {
        if sql.trim().is_empty() {
            continue;
        }
        sqlx::query(sql).execute(db).await?;
    }
    Ok(())
}
