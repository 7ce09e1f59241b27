// ==========================================
// 手术排程表导入系统 - 配置层
// ==========================================
// 职责: 读取每个表格文件对应的导入配置（YAML）
// 产出: IngestConfig（表级固定值 + 列 → 字段解析器）
// ==========================================

pub mod error;
pub mod ingest_config;

pub use error::{ConfigError, ConfigResult};
pub use ingest_config::{IngestConfig, DEFAULT_HEADING_ROW};
