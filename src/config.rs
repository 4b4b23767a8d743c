use std::{env, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;

use crate::error::{Error, Result};

/// 应用配置
///
/// 先读取可选的 TOML 文件（路径来自 `BLOG_API_CONFIG`），再由环境变量覆盖。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub migrations_file: Option<String>,
    pub pool: PoolConfig,
}

/// 连接池配置，单位均为秒
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            bind_addr: "0.0.0.0:3000".to_string(),
            migrations_file: None,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            idle_timeout_secs: 60,
            max_lifetime_secs: 1500,
            acquire_timeout_secs: 2,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl AppConfig {
    /// 从 `.env`、配置文件和环境变量加载配置
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match env::var("BLOG_API_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());

        if config.database_url.is_empty() {
            return Err(Error::Internal(
                "environment variable `DATABASE_URL` not present".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用查找函数覆盖配置项，查找不到或解析失败的键保持原值
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(file) = lookup("MIGRATIONS_FILE") {
            self.migrations_file = Some(file);
        }

        let pool = &mut self.pool;
        override_parsed(&lookup, "DB_MAX_CONNECTIONS", &mut pool.max_connections);
        override_parsed(&lookup, "DB_MIN_CONNECTIONS", &mut pool.min_connections);
        override_parsed(&lookup, "DB_IDLE_TIMEOUT_SECS", &mut pool.idle_timeout_secs);
        override_parsed(&lookup, "DB_MAX_LIFETIME_SECS", &mut pool.max_lifetime_secs);
        override_parsed(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", &mut pool.acquire_timeout_secs);
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(value) = lookup(key).and_then(|v| v.trim().parse().ok()) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults_match_pool_policy() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.pool.max_connections, 10);
        assert_eq!(config.pool.min_connections, 2);
        assert_eq!(config.pool.max_lifetime(), Duration::from_secs(1500));
    }

    #[test]
    fn test_toml_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            database_url = "postgres://localhost/blog"
            [pool]
            max_connections = 50
            "#,
        )
        .expect("parse config");

        assert_eq!(config.database_url, "postgres://localhost/blog");
        assert_eq!(config.pool.max_connections, 50);
        assert_eq!(config.pool.idle_timeout_secs, 60);
        assert!(config.migrations_file.is_none());
    }

    #[test]
    fn test_env_overrides_file_and_ignores_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgres://env/blog"),
            ("DB_MAX_CONNECTIONS", "25"),
            ("DB_MIN_CONNECTIONS", "not-a-number"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.database_url, "postgres://env/blog");
        assert_eq!(config.pool.max_connections, 25);
        assert_eq!(config.pool.min_connections, 2);
    }
}
