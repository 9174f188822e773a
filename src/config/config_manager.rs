// ==========================================
// BOM 成本核算系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::PartnerLookup;
use crate::engine::flattener::DEFAULT_FLATTEN_DEPTH;
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
    /// - None: 配置不存在
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
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    // ===== 成本核算配置 =====

    /// 批量核算时是否计入工序（工时）成本
    pub fn get_include_operations(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::INCLUDE_OPERATIONS, "true")?;
        Ok(value.trim().eq_ignore_ascii_case("true") || value.trim() == "1")
    }

    /// 原材料展开的最大层级深度（默认即引擎的 DEFAULT_FLATTEN_DEPTH）
    pub fn get_flatten_depth_limit(&self) -> Result<usize, Box<dyn Error>> {
        let fallback = DEFAULT_FLATTEN_DEPTH.to_string();
        let value = self.get_config_or_default(config_keys::FLATTEN_DEPTH_LIMIT, &fallback)?;
        let depth = value
            .trim()
            .parse::<usize>()
            .unwrap_or(DEFAULT_FLATTEN_DEPTH);
        // 深度为 0 没有意义，回退默认值
        if depth == 0 {
            Ok(DEFAULT_FLATTEN_DEPTH)
        } else {
            Ok(depth)
        }
    }

    // ===== 余额导入配置 =====

    /// CSV 列分隔符（逗号/分号/制表符）
    pub fn get_csv_delimiter(&self) -> Result<u8, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::CSV_DELIMITER, ",")?;
        match value.trim() {
            ";" | "semicolon" => Ok(b';'),
            "\t" | "tab" => Ok(b'\t'),
            _ => Ok(b','),
        }
    }

    /// 伙伴匹配方式（id / ref / name）
    pub fn get_partner_lookup(&self) -> Result<PartnerLookup, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PARTNER_LOOKUP, "id")?;
        Ok(value.trim().parse::<PartnerLookup>().unwrap_or(PartnerLookup::Id))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 成本核算
    pub const INCLUDE_OPERATIONS: &str = "calc.include_operations";
    pub const FLATTEN_DEPTH_LIMIT: &str = "calc.flatten_depth_limit";

    // 余额导入
    pub const CSV_DELIMITER: &str = "import.csv_delimiter";
    pub const PARTNER_LOOKUP: &str = "import.partner_lookup";
}
