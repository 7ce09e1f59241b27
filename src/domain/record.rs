// ==========================================
// 手术排程表导入系统 - 行记录
// ==========================================
// 用途: 单行解析过程中的中间产物（列名 → 值）
// 生命周期: 一行内构建，完成后作为下一行的"上一条记录"
// ==========================================

use crate::domain::types::FieldValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// 取消标记写入的列
pub const CANCELLED: &str = "cancelled";
/// 表级固定值: 手术路径
pub const SURGICAL_PATHWAY: &str = "surgical_pathway";
/// 表级固定值: 主刀医生
pub const SURGICAL_CONSULTANT: &str = "surgical_consultant";

// ==========================================
// Record - 行记录构建器
// ==========================================
// 各字段解析器按值传入、按值返回，不做原地共享修改
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个字段并返回新记录
    pub fn with(mut self, column: &str, value: FieldValue) -> Self {
        self.fields.insert(column.to_string(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    /// 字段缺失或为空
    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).map_or(true, FieldValue::is_empty)
    }

    /// 字段存在且为真值
    pub fn is_truthy(&self, column: &str) -> bool {
        self.get(column).is_some_and(FieldValue::is_truthy)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
