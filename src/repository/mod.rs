// ==========================================
// 手术排程表导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含解析逻辑
// ==========================================
// 职责: 提供数据访问接口，屏蔽数据库细节
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

pub mod error;
pub mod procedure_repo;
pub mod schema;
pub mod session;

pub use error::{RepositoryError, RepositoryResult};
pub use procedure_repo::{ProcedureRepository, UpsertOutcome};
pub use schema::{ensure_schema, CURRENT_SCHEMA_VERSION};
pub use session::{Session, Store};
