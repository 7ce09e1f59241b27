// ==========================================
// 手术排程表导入系统 - 领域模型层
// ==========================================
// 职责: 定义实体、值类型、存储列元数据
// 红线: 不含数据访问逻辑,不含表格读取逻辑
// ==========================================

pub mod columns;
pub mod patient;
pub mod procedure;
pub mod record;
pub mod types;

// 重导出核心类型
pub use columns::{all_columns, column, has_required_fields, required_columns, ColumnDef};
pub use patient::Patient;
pub use procedure::{split_record, CoercionError, Procedure, ProcedureView};
pub use record::Record;
pub use types::{ColumnKind, FieldValue, Table};
