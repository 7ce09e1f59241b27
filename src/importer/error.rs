// ==========================================
// 手术排程表导入系统 - 导入模块错误类型
// ==========================================
// 只有致命错误会走到这里；单行问题（缺必填字段、类型/约束违反、
// 无法解析的日期）在行循环内记录日志后继续
// 工具: thiserror 派生宏
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use crate::workbook::WorkbookError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("工作簿错误: {0}")]
    Workbook(#[from] WorkbookError),

    #[error("存储错误: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type IngestResult<T> = Result<T, IngestError>;
