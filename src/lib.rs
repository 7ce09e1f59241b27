// ==========================================
// 手术排程表导入系统 - 核心库
// ==========================================
// 技术栈: Rust + calamine + SQLite
// 系统定位: 把格式不统一的计划手术 Excel 表按声明式配置导入数据库
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 表格读取层 - .xls / .xlsx 值与格式
pub mod workbook;

// 配置层 - 每个表格文件的导入配置
pub mod config;

// 导入层 - 字段解析与行导入
pub mod importer;

// 数据仓储层 - 数据访问与对账
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::IngestConfig;
pub use domain::{FieldValue, Patient, Procedure, ProcedureView, Record};
pub use importer::{ingest_file, IngestError, IngestReport};
pub use repository::Store;
pub use workbook::Workbook;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
