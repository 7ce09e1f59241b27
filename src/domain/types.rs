// ==========================================
// 手术排程表导入系统 - 领域类型定义
// ==========================================
// 职责: 单元格值、列语义类型、目标表
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

// ==========================================
// FieldValue - 单元格/字段值
// ==========================================
// 来源: 表格读取层自动识别的原生类型
// 用途: 字段解析器在记录中流转的值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// 空值判定: 缺失或空字符串
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 真值判定（0、false、空字符串均视为无值）
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Empty => false,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Bool(b) => *b,
            FieldValue::Date(_) | FieldValue::DateTime(_) => true,
        }
    }

    /// 字符串值（仅 Text）
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 渲染为文本（整数值的浮点数不带小数部分）
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

// ==========================================
// ColumnKind - 存储列语义类型
// ==========================================
// 在加载配置时解析一次，字段解析器据此分派
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Text,
    Date,
    Boolean,
    Numeric,
}

// ==========================================
// Table - 目标表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Table {
    Patient,
    Procedure,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Patient => "patient",
            Table::Procedure => "procedure",
        }
    }
}
