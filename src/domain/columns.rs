// ==========================================
// 手术排程表导入系统 - 存储列元数据
// ==========================================
// 职责: 描述 patient / procedure 两张表的列定义
// 用途: 配置加载时解析列类型；必填字段校验；实体拆分
// ==========================================

use crate::domain::record::Record;
use crate::domain::types::{ColumnKind, Table};
use tracing::debug;

/// 单个存储列的定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub table: Table,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub auto_generated: bool,
    pub has_default: bool,
}

impl ColumnDef {
    const fn new(name: &'static str, table: Table, kind: ColumnKind, nullable: bool) -> Self {
        Self {
            name,
            table,
            kind,
            nullable,
            auto_generated: false,
            has_default: false,
        }
    }

    /// 必填: 不可空、非自增、无默认值
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.auto_generated && !self.has_default
    }
}

// ===== patient 表 =====
pub const PATIENT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("idmrn", Table::Patient, ColumnKind::Text, false),
    ColumnDef::new("patient_given_name", Table::Patient, ColumnKind::Text, false),
    ColumnDef::new("patient_family_name", Table::Patient, ColumnKind::Text, false),
    ColumnDef::new("date_of_birth", Table::Patient, ColumnKind::Date, true),
    ColumnDef::new("nhs_number", Table::Patient, ColumnKind::Text, true),
    ColumnDef::new("sex", Table::Patient, ColumnKind::Numeric, true),
];

// ===== procedure 表 =====
pub const PROCEDURE_COLUMNS: &[ColumnDef] = &[
    ColumnDef {
        auto_generated: true,
        ..ColumnDef::new("procedure_id", Table::Procedure, ColumnKind::Numeric, false)
    },
    ColumnDef::new("idmrn", Table::Procedure, ColumnKind::Text, true),
    ColumnDef::new("surgical_procedure", Table::Procedure, ColumnKind::Text, false),
    ColumnDef::new("surgical_date", Table::Procedure, ColumnKind::Date, false),
    ColumnDef::new("surgical_priority", Table::Procedure, ColumnKind::Text, true),
    ColumnDef::new("surgical_consultant", Table::Procedure, ColumnKind::Text, true),
    ColumnDef::new("surgical_pathway", Table::Procedure, ColumnKind::Text, false),
    ColumnDef::new("surgical_notes", Table::Procedure, ColumnKind::Text, true),
    ColumnDef::new("pacu_request", Table::Procedure, ColumnKind::Boolean, true),
    ColumnDef {
        has_default: true,
        ..ColumnDef::new("cancelled", Table::Procedure, ColumnKind::Boolean, false)
    },
];

/// 全部列（procedure 在前，patient 在后）
pub fn all_columns() -> impl Iterator<Item = &'static ColumnDef> {
    PROCEDURE_COLUMNS.iter().chain(PATIENT_COLUMNS.iter())
}

/// 按列名查找（两表同名列定义一致，优先 procedure）
pub fn column(name: &str) -> Option<&'static ColumnDef> {
    all_columns().find(|c| c.name == name)
}

/// 某表是否包含该列
pub fn table_has_column(table: Table, name: &str) -> bool {
    let columns = match table {
        Table::Patient => PATIENT_COLUMNS,
        Table::Procedure => PROCEDURE_COLUMNS,
    };
    columns.iter().any(|c| c.name == name)
}

pub fn required_columns() -> impl Iterator<Item = &'static ColumnDef> {
    all_columns().filter(|c| c.is_required())
}

/// 返回记录中第一个缺失的必填字段
pub fn missing_required_field(record: &Record) -> Option<&'static str> {
    required_columns()
        .find(|c| !record.is_truthy(c.name))
        .map(|c| c.name)
}

/// 必填字段是否齐全（避免最常见的落库失败）
pub fn has_required_fields(record: &Record) -> bool {
    match missing_required_field(record) {
        None => true,
        Some(field) => {
            debug!(field = field, record = ?record, "缺少必填字段");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FieldValue;
    use chrono::NaiveDate;

    fn complete_record() -> Record {
        Record::new()
            .with("idmrn", "001".into())
            .with("patient_given_name", "Alice".into())
            .with("patient_family_name", "Smith".into())
            .with("surgical_procedure", "Knee".into())
            .with(
                "surgical_date",
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().into(),
            )
            .with("surgical_pathway", "ortho".into())
    }

    #[test]
    fn test_required_columns() {
        let names: Vec<&str> = required_columns().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "surgical_procedure",
                "surgical_date",
                "surgical_pathway",
                "idmrn",
                "patient_given_name",
                "patient_family_name",
            ]
        );
    }

    #[test]
    fn test_has_required_fields() {
        assert!(has_required_fields(&complete_record()));

        let missing = complete_record().with("surgical_pathway", FieldValue::Empty);
        assert!(!has_required_fields(&missing));
        assert_eq!(missing_required_field(&missing), Some("surgical_pathway"));
    }

    #[test]
    fn test_column_lookup() {
        assert_eq!(column("surgical_date").map(|c| c.kind), Some(ColumnKind::Date));
        assert_eq!(column("pacu_request").map(|c| c.kind), Some(ColumnKind::Boolean));
        assert!(column("no_such_column").is_none());
        assert!(table_has_column(Table::Patient, "idmrn"));
        assert!(table_has_column(Table::Procedure, "idmrn"));
        assert!(!table_has_column(Table::Patient, "cancelled"));
    }
}
