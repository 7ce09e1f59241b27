// ==========================================
// 手术排程表导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键必须开启）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 解析连接串: --db 参数 > SURGICAL_LIST_DB 环境变量 > 用户数据目录
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 连接串环境变量名
pub const DB_ENV_VAR: &str = "SURGICAL_LIST_DB";

/// 内存数据库连接串
pub const MEMORY_DB: &str = ":memory:";

const SQLITE_PREFIX: &str = "sqlite://";
const APP_DIR: &str = "surgical-list-importer";
const DB_FILE: &str = "procedures.db";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
///
/// 接受裸路径、`sqlite://路径` 或 `:memory:`。
pub fn open_sqlite_connection(conn_str: &str) -> rusqlite::Result<Connection> {
    let path = strip_sqlite_prefix(conn_str);
    let conn = if path == MEMORY_DB {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 去掉可选的 `sqlite://` 前缀
pub fn strip_sqlite_prefix(conn_str: &str) -> &str {
    conn_str.strip_prefix(SQLITE_PREFIX).unwrap_or(conn_str)
}

/// 确定本次运行使用的连接串
///
/// 优先级: 显式参数 > 环境变量 > `<数据目录>/surgical-list-importer/procedures.db`。
/// 使用默认位置时会创建其父目录。
pub fn resolve_connection_string(flag: Option<&str>) -> std::io::Result<String> {
    if let Some(explicit) = flag.filter(|s| !s.trim().is_empty()) {
        return Ok(explicit.to_string());
    }
    if let Ok(from_env) = std::env::var(DB_ENV_VAR) {
        if !from_env.trim().is_empty() {
            return Ok(from_env);
        }
    }

    let dir = default_data_dir().join(APP_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join(DB_FILE).to_string_lossy().into_owned())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
