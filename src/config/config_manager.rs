// ==========================================
// 报表数据导入平台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、默认值兜底
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::config::{
    DEFAULT_FUZZY_CUTOFF, DEFAULT_PREVIEW_CAP, DEFAULT_SCAN_LIMIT, DEFAULT_STORAGE_DIR,
};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在（表不存在也视为不存在）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("no such table") => {
                Ok(None)
            }
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（CLI/测试注入覆盖用）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析数值配置，解析失败或缺失时返回默认值
    fn get_parsed_or<T: std::str::FromStr>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .and_then(|v| v.trim().parse::<T>().ok())
            .unwrap_or(default))
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_preview_cap(&self) -> Result<usize, Box<dyn Error>> {
        let cap = self.get_parsed_or("import/preview_cap", DEFAULT_PREVIEW_CAP)?;
        // 0 无意义，视为未配置
        Ok(if cap == 0 { DEFAULT_PREVIEW_CAP } else { cap })
    }

    async fn get_scan_limit(&self) -> Result<usize, Box<dyn Error>> {
        let limit = self.get_parsed_or("import/scan_limit", DEFAULT_SCAN_LIMIT)?;
        Ok(if limit == 0 { DEFAULT_SCAN_LIMIT } else { limit })
    }

    async fn get_fuzzy_cutoff(&self) -> Result<f64, Box<dyn Error>> {
        let cutoff: f64 = self.get_parsed_or("import/fuzzy_cutoff", DEFAULT_FUZZY_CUTOFF)?;
        Ok(if (0.0..=1.0).contains(&cutoff) {
            cutoff
        } else {
            DEFAULT_FUZZY_CUTOFF
        })
    }

    async fn get_storage_dir(&self) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value("import/storage_dir")?
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string()))
    }
}
