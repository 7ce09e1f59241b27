// ==========================================
// 手术排程表导入系统 - 导入配置
// ==========================================
// 职责: 读取每个表格文件对应的 YAML 配置
// 产出: 表级固定值 + 列标识 → 字段解析器 的映射
// 列标识: heading_row > 0 时为表头文字（excel_heading），
//         heading_row == 0 时为列字母（excel_column）
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::record::{SURGICAL_CONSULTANT, SURGICAL_PATHWAY};
use crate::domain::{column, FieldValue, Record};
use crate::importer::field_parser::{FieldParser, FieldParserOptions};
use crate::workbook::{column_name_to_index, parse_cell_reference};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_HEADING_ROW: usize = 1;

// ==========================================
// IngestConfig
// ==========================================
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub surgical_pathway: Option<String>,
    pub surgical_consultant: Option<String>,
    /// 只导入这些工作表；为空表示全部
    pub sheets: Vec<String>,
    pub week_start_date_cell: Option<String>,
    /// 表头所在行（1 基）；0 表示无表头
    pub heading_row: usize,
    /// 列标识 → 解析器，保持配置顺序
    pub columns: Vec<(String, FieldParser)>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            surgical_pathway: None,
            surgical_consultant: None,
            sheets: Vec::new(),
            week_start_date_cell: None,
            heading_row: DEFAULT_HEADING_ROW,
            columns: Vec::new(),
        }
    }
}

/// 单个列定义（原始 YAML 形态）
#[derive(Debug, Deserialize)]
struct ColumnEntry {
    excel_heading: Option<Value>,
    excel_column: Option<Value>,
    column_name: String,
    #[serde(flatten)]
    options: FieldParserOptions,
}

impl IngestConfig {
    /// 读取配置文件
    pub fn read(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// 表格文件对应的默认配置路径（同名 .yaml）
    pub fn default_path_for(spreadsheet: impl AsRef<Path>) -> PathBuf {
        spreadsheet.as_ref().with_extension("yaml")
    }

    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let contents: Value = serde_yaml::from_str(text)?;
        let root = match contents {
            Value::Mapping(map) => map,
            // 空文件
            Value::Null => Mapping::new(),
            other => {
                return Err(ConfigError::WrongType {
                    setting: "<root>".to_string(),
                    expected: "mapping",
                    actual: type_name(&other),
                })
            }
        };

        let mut config = IngestConfig {
            surgical_pathway: string_setting(&root, "surgical_pathway")?,
            surgical_consultant: string_setting(&root, "surgical_consultant")?,
            sheets: list_setting(&root, "sheets")?,
            week_start_date_cell: string_setting(&root, "week_start_date_cell")?,
            heading_row: heading_row_setting(&root)?,
            columns: Vec::new(),
        };

        if let Some(cell) = &config.week_start_date_cell {
            parse_cell_reference(cell)
                .map_err(|_| ConfigError::InvalidCellReference(cell.clone()))?;
        }

        let entries = match root.get("columns") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(seq)) => seq.clone(),
            Some(other) => {
                return Err(ConfigError::WrongType {
                    setting: "columns".to_string(),
                    expected: "list",
                    actual: type_name(other),
                })
            }
        };
        for (index, entry) in entries.into_iter().enumerate() {
            let (identifier, parser) = config.build_parser(index, entry)?;
            config.insert_column(identifier, parser);
        }

        debug!(
            columns = config.columns.len(),
            heading_row = config.heading_row,
            sheets = ?config.sheets,
            "导入配置已加载"
        );
        Ok(config)
    }

    fn build_parser(&self, index: usize, entry: Value) -> ConfigResult<(String, FieldParser)> {
        let entry: ColumnEntry = serde_yaml::from_value(entry).map_err(|e| {
            ConfigError::InvalidColumn {
                index,
                message: e.to_string(),
            }
        })?;

        let (key, raw) = if self.headerless() {
            ("excel_column", entry.excel_column.as_ref())
        } else {
            ("excel_heading", entry.excel_heading.as_ref())
        };
        let identifier = raw
            .and_then(scalar_text)
            .map(|s| s.trim().to_string())
            .ok_or(ConfigError::MissingIdentifier { index, key })?;
        if self.headerless() {
            column_name_to_index(&identifier)
                .map_err(|_| ConfigError::InvalidColumnLetter(identifier.clone()))?;
        }

        let target = column(&entry.column_name).ok_or_else(|| ConfigError::UnknownColumn {
            index,
            column: entry.column_name.clone(),
        })?;
        if let Some(extra) = &entry.options.extra_column {
            if column(extra).is_none() {
                return Err(ConfigError::UnknownColumn {
                    index,
                    column: extra.clone(),
                });
            }
        }

        let parser = FieldParser::new(target.name, target.kind, entry.options);
        Ok((identifier, parser))
    }

    /// 同一标识后出现的定义替换先前的定义
    fn insert_column(&mut self, identifier: String, parser: FieldParser) {
        match self.columns.iter_mut().find(|(id, _)| *id == identifier) {
            Some(slot) => slot.1 = parser,
            None => self.columns.push((identifier, parser)),
        }
    }

    pub fn headerless(&self) -> bool {
        self.heading_row == 0
    }

    pub fn parser_for(&self, identifier: &str) -> Option<&FieldParser> {
        self.columns
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, parser)| parser)
    }

    /// 工作表是否在导入范围内（按去首尾空白的标题匹配）
    pub fn includes_sheet(&self, title: &str) -> bool {
        self.sheets.is_empty() || self.sheets.iter().any(|s| s == title.trim())
    }

    /// 每行记录的初始值（表级固定值）
    pub fn seed_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(pathway) = &self.surgical_pathway {
            record = record.with(SURGICAL_PATHWAY, FieldValue::Text(pathway.clone()));
        }
        if let Some(consultant) = &self.surgical_consultant {
            record = record.with(SURGICAL_CONSULTANT, FieldValue::Text(consultant.clone()));
        }
        record
    }
}

// ==========================================
// 全局配置项类型校验
// ==========================================
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn wrong_type(setting: &str, expected: &'static str, actual: &Value) -> ConfigError {
    ConfigError::WrongType {
        setting: setting.to_string(),
        expected,
        actual: type_name(actual),
    }
}

fn string_setting(root: &Mapping, setting: &str) -> ConfigResult<Option<String>> {
    match root.get(setting) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(wrong_type(setting, "string", other)),
    }
}

fn list_setting(root: &Mapping, setting: &str) -> ConfigResult<Vec<String>> {
    match root.get(setting) {
        None => Ok(Vec::new()),
        Some(Value::Sequence(items)) => Ok(items.iter().filter_map(scalar_text).collect()),
        Some(other) => Err(wrong_type(setting, "list", other)),
    }
}

fn heading_row_setting(root: &Mapping) -> ConfigResult<usize> {
    match root.get("heading_row") {
        None => Ok(DEFAULT_HEADING_ROW),
        Some(value) => match value {
            Value::Number(n) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| wrong_type("heading_row", "non-negative integer", value)),
            other => Err(wrong_type("heading_row", "integer", other)),
        },
    }
}

/// 标量转文本（表头可能写成数字）
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
