// ==========================================
// 手术排程表导入系统 - 仓储层错误类型
// ==========================================
// 分类: 约束/类型错误属于单行问题（回滚该行后继续），
//       其余数据库错误为致命错误（中止本次导入）
// 工具: thiserror 派生宏
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 单行错误 =====
    #[error("约束违反: {0}")]
    Constraint(String),

    #[error("类型错误: {0}")]
    Type(String),

    // ===== 致命错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("数据库版本不匹配: 期望 {expected}，实际 {actual}")]
    SchemaVersionMismatch { expected: i64, actual: i64 },
}

impl RepositoryError {
    /// 是否为单行可忽略的错误
    pub fn is_row_level(&self) -> bool {
        matches!(self, RepositoryError::Constraint(_) | RepositoryError::Type(_))
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, msg) => {
                let message = msg.clone().unwrap_or_else(|| err.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => RepositoryError::Constraint(message),
                    ErrorCode::TypeMismatch => RepositoryError::Type(message),
                    ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                        RepositoryError::DatabaseConnectionError(message)
                    }
                    _ => RepositoryError::DatabaseQueryError(message),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::ToSqlConversionFailure(..) => RepositoryError::Type(err.to_string()),
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_constraint_violation_is_row_level() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x TEXT NOT NULL);").unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO t (x) VALUES (NULL)", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, RepositoryError::Constraint(_)));
        assert!(err.is_row_level());
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO missing (x) VALUES (1)", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, RepositoryError::DatabaseQueryError(_)));
        assert!(!err.is_row_level());
    }
}
