// ==========================================
// 手术排程表导入系统 - 导入层
// ==========================================
// 职责: 把表格行解析为患者/手术记录并写入存储
// 核心: 字段解析器（单元格 → 记录字段）+ 工作表导入引擎（行循环）
// ==========================================

pub mod date_parser;
pub mod error;
pub mod field_parser;
pub mod sheet_ingester;

// 重导出核心类型
pub use error::{IngestError, IngestResult};
pub use field_parser::{CancellationMark, FieldParser, FieldParserOptions, InsertMethod};
pub use sheet_ingester::{ingest_file, ingest_sheet, ingest_workbook, IngestReport};
