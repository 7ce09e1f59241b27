// ==========================================
// 手术排程表导入系统 - 配置错误类型
// ==========================================
// 配置错误均为致命错误: 在任何导入开始前中止
// ==========================================

use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件 YAML 解析失败: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("配置项 {setting} 类型错误: 期望 {expected}，实际 {actual}")]
    WrongType {
        setting: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("第 {index} 个列定义无效: {message}")]
    InvalidColumn { index: usize, message: String },

    #[error("第 {index} 个列定义缺少 {key}")]
    MissingIdentifier { index: usize, key: &'static str },

    #[error("第 {index} 个列定义引用了未知的存储列: {column}")]
    UnknownColumn { index: usize, column: String },

    #[error("无效的列字母: {0}")]
    InvalidColumnLetter(String),

    #[error("无效的单元格引用 (week_start_date_cell): {0}")]
    InvalidCellReference(String),
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
