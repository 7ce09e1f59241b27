// ==========================================
// 手术排程表导入系统 - 手术领域模型
// ==========================================
// 对齐: procedure 表
// 业务键: (病历号, 手术名称, 手术日期)
// ==========================================

use crate::domain::columns::column;
use crate::domain::patient::{merge, Patient};
use crate::domain::record::Record;
use crate::domain::types::{ColumnKind, FieldValue};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ==========================================
// Procedure - 计划手术
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Procedure {
    pub procedure_id: Option<i64>,           // 自增主键
    pub idmrn: Option<String>,               // 关联 patient（FK）
    pub surgical_procedure: Option<String>,  // 手术名称（必填）
    pub surgical_date: Option<NaiveDate>,    // 手术日期（必填）
    pub surgical_priority: Option<String>,   // 优先级
    pub surgical_consultant: Option<String>, // 主刀医生
    pub surgical_pathway: Option<String>,    // 手术路径（必填）
    pub surgical_notes: Option<String>,      // 备注
    pub pacu_request: Option<bool>,          // 是否需要麻醉后复苏室
    pub cancelled: Option<bool>,             // 取消标记（落库默认 false）
}

impl Procedure {
    /// 用另一条记录的非空字段覆盖本记录（自增主键除外）
    pub fn merge_from(&mut self, other: &Procedure) {
        merge(&mut self.idmrn, &other.idmrn);
        merge(&mut self.surgical_procedure, &other.surgical_procedure);
        merge(&mut self.surgical_date, &other.surgical_date);
        merge(&mut self.surgical_priority, &other.surgical_priority);
        merge(&mut self.surgical_consultant, &other.surgical_consultant);
        merge(&mut self.surgical_pathway, &other.surgical_pathway);
        merge(&mut self.surgical_notes, &other.surgical_notes);
        merge(&mut self.pacu_request, &other.pacu_request);
        merge(&mut self.cancelled, &other.cancelled);
    }
}

// ==========================================
// 记录 → 实体拆分
// ==========================================

/// 字段值与列声明类型不符
#[derive(Error, Debug, Clone, PartialEq)]
#[error("字段 {column} 的值 \"{value}\" 无法转换为 {expected:?}")]
pub struct CoercionError {
    pub column: String,
    pub value: String,
    pub expected: ColumnKind,
}

/// 按列声明类型规整后的值
enum Coerced {
    Text(String),
    Date(NaiveDate),
    Bool(bool),
    Int(i64),
}

fn coerce(record: &Record, name: &str) -> Result<Option<Coerced>, CoercionError> {
    let Some(value) = record.get(name) else {
        return Ok(None);
    };
    let Some(def) = column(name) else {
        return Ok(None);
    };
    let fail = || CoercionError {
        column: name.to_string(),
        value: value.to_text(),
        expected: def.kind,
    };

    let coerced = match (def.kind, value) {
        (_, FieldValue::Empty) => None,
        (ColumnKind::Text, v) => Some(Coerced::Text(v.to_text())),
        (ColumnKind::Date, FieldValue::Date(d)) => Some(Coerced::Date(*d)),
        (ColumnKind::Date, FieldValue::DateTime(dt)) => Some(Coerced::Date(dt.date())),
        // 非日期值不写入日期列
        (ColumnKind::Date, _) => None,
        (ColumnKind::Boolean, FieldValue::Bool(b)) => Some(Coerced::Bool(*b)),
        (ColumnKind::Boolean, FieldValue::Number(n)) => Some(Coerced::Bool(*n != 0.0)),
        (ColumnKind::Boolean, FieldValue::Text(s)) => match s.trim().to_lowercase().as_str() {
            "" => None,
            "y" | "yes" | "true" | "1" => Some(Coerced::Bool(true)),
            "n" | "no" | "false" | "0" => Some(Coerced::Bool(false)),
            _ => return Err(fail()),
        },
        (ColumnKind::Numeric, FieldValue::Number(n)) if n.fract() == 0.0 => {
            Some(Coerced::Int(*n as i64))
        }
        (ColumnKind::Numeric, FieldValue::Bool(b)) => Some(Coerced::Int(i64::from(*b))),
        (ColumnKind::Numeric, FieldValue::Text(s)) if s.trim().is_empty() => None,
        (ColumnKind::Numeric, FieldValue::Text(s)) => {
            Some(Coerced::Int(s.trim().parse::<i64>().map_err(|_| fail())?))
        }
        (ColumnKind::Boolean | ColumnKind::Numeric, _) => return Err(fail()),
    };
    Ok(coerced)
}

fn text_field(record: &Record, name: &str) -> Result<Option<String>, CoercionError> {
    Ok(match coerce(record, name)? {
        Some(Coerced::Text(s)) => Some(s),
        _ => None,
    })
}

fn date_field(record: &Record, name: &str) -> Result<Option<NaiveDate>, CoercionError> {
    Ok(match coerce(record, name)? {
        Some(Coerced::Date(d)) => Some(d),
        _ => None,
    })
}

fn bool_field(record: &Record, name: &str) -> Result<Option<bool>, CoercionError> {
    Ok(match coerce(record, name)? {
        Some(Coerced::Bool(b)) => Some(b),
        _ => None,
    })
}

fn int_field(record: &Record, name: &str) -> Result<Option<i64>, CoercionError> {
    Ok(match coerce(record, name)? {
        Some(Coerced::Int(i)) => Some(i),
        _ => None,
    })
}

/// 按列所属表把一行记录拆分为患者 + 手术实体
///
/// 每个字段按其声明类型再次规整（字符串/布尔/日期）。
pub fn split_record(record: &Record) -> Result<(Patient, Procedure), CoercionError> {
    let patient = Patient {
        idmrn: text_field(record, "idmrn")?,
        patient_given_name: text_field(record, "patient_given_name")?,
        patient_family_name: text_field(record, "patient_family_name")?,
        date_of_birth: date_field(record, "date_of_birth")?,
        nhs_number: text_field(record, "nhs_number")?,
        sex: int_field(record, "sex")?,
    };

    let procedure = Procedure {
        procedure_id: None,
        idmrn: patient.idmrn.clone(),
        surgical_procedure: text_field(record, "surgical_procedure")?,
        surgical_date: date_field(record, "surgical_date")?,
        surgical_priority: text_field(record, "surgical_priority")?,
        surgical_consultant: text_field(record, "surgical_consultant")?,
        surgical_pathway: text_field(record, "surgical_pathway")?,
        surgical_notes: text_field(record, "surgical_notes")?,
        pacu_request: bool_field(record, "pacu_request")?,
        cancelled: bool_field(record, "cancelled")?,
    };

    Ok((patient, procedure))
}

// ==========================================
// ProcedureView - 手术 + 患者联合视图
// ==========================================
// 用途: 导出/调试输出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureView {
    pub procedure_id: i64,
    pub idmrn: Option<String>,
    pub surgical_procedure: String,
    pub surgical_date: NaiveDate,
    pub surgical_priority: Option<String>,
    pub surgical_consultant: Option<String>,
    pub surgical_pathway: String,
    pub surgical_notes: Option<String>,
    pub pacu_request: Option<bool>,
    pub cancelled: bool,
    pub patient_given_name: Option<String>,
    pub patient_family_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nhs_number: Option<String>,
    pub sex: Option<i64>,
}

impl fmt::Display for ProcedureView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pacu = match self.pacu_request {
            Some(true) => "True",
            Some(false) => "False",
            None => "None",
        };
        write!(
            f,
            "<Procedure {} '{}' on {} for {} {} (MRN={}){} PACU={}>",
            self.procedure_id,
            self.surgical_procedure,
            self.surgical_date.format("%Y-%m-%d"),
            self.patient_given_name.as_deref().unwrap_or(""),
            self.patient_family_name.as_deref().unwrap_or(""),
            self.idmrn.as_deref().unwrap_or(""),
            if self.cancelled { " CANCELLED" } else { "" },
            pacu,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new()
            .with("idmrn", FieldValue::Number(12345.0))
            .with("patient_given_name", "Alice".into())
            .with("patient_family_name", "Smith".into())
            .with("surgical_procedure", "Knee".into())
            .with(
                "surgical_date",
                FieldValue::DateTime(
                    NaiveDate::from_ymd_opt(2024, 1, 5)
                        .unwrap()
                        .and_hms_opt(9, 30, 0)
                        .unwrap(),
                ),
            )
            .with("surgical_pathway", "ortho".into())
            .with("pacu_request", "Yes".into())
    }

    #[test]
    fn test_split_record_by_table() {
        let (patient, procedure) = split_record(&record()).unwrap();

        assert_eq!(patient.idmrn.as_deref(), Some("12345"));
        assert_eq!(patient.patient_family_name.as_deref(), Some("Smith"));
        assert_eq!(procedure.idmrn.as_deref(), Some("12345"));
        assert_eq!(
            procedure.surgical_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert_eq!(procedure.pacu_request, Some(true));
        assert_eq!(procedure.cancelled, None);
    }

    #[test]
    fn test_split_record_rejects_bad_boolean() {
        let bad = record().with("pacu_request", "maybe".into());
        let err = split_record(&bad).unwrap_err();
        assert_eq!(err.column, "pacu_request");
        assert_eq!(err.expected, ColumnKind::Boolean);
    }

    #[test]
    fn test_non_date_value_is_dropped_for_date_column() {
        let odd = record().with("date_of_birth", "unknown".into());
        let (patient, _) = split_record(&odd).unwrap();
        assert_eq!(patient.date_of_birth, None);
    }

    #[test]
    fn test_procedure_merge_skips_identity_and_nulls() {
        let mut existing = Procedure {
            procedure_id: Some(7),
            surgical_procedure: Some("Knee".to_string()),
            surgical_notes: Some("first".to_string()),
            cancelled: Some(true),
            ..Procedure::default()
        };
        let update = Procedure {
            procedure_id: Some(99),
            surgical_procedure: Some("Knee revision".to_string()),
            ..Procedure::default()
        };

        existing.merge_from(&update);

        assert_eq!(existing.procedure_id, Some(7));
        assert_eq!(existing.surgical_procedure.as_deref(), Some("Knee revision"));
        assert_eq!(existing.surgical_notes.as_deref(), Some("first"));
        assert_eq!(existing.cancelled, Some(true));
    }
}
