// ==========================================
// 手术排程表导入系统 - 表格读取层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 表格读取层错误类型
#[derive(Error, Debug)]
pub enum WorkbookError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.xls）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    // ===== 格式信息错误 =====
    #[error("xlsx 压缩包读取失败: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML 解析失败 ({part}): {message}")]
    Xml { part: String, message: String },

    #[error("BIFF 记录解析失败: {0}")]
    Biff(String),

    // ===== 单元格引用错误 =====
    #[error("无效的单元格引用: {0}")]
    InvalidCellReference(String),
}

impl From<calamine::Error> for WorkbookError {
    fn from(err: calamine::Error) -> Self {
        WorkbookError::ExcelParseError(err.to_string())
    }
}

impl WorkbookError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        WorkbookError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type WorkbookResult<T> = Result<T, WorkbookError>;
