// ==========================================
// 手术排程表导入系统 - 字段解析器
// ==========================================
// 职责: 把一个表格列的单元格清洗、转换、合并进行记录
// 步骤（固定顺序）:
//   1. 值替换（星期代码 → 日期）
//   2. 字符串日期修复
//   3. 时间戳截断为日期
//   4. 字符串布尔值转换
//   5. 合并入记录（覆盖 / 追加）
//   6. 拆分到附加列
//   7. 空值传播（可先看下一行）
//   8. 取消标记识别
// ==========================================

use crate::domain::record::CANCELLED;
use crate::domain::{ColumnKind, FieldValue, Record};
use crate::importer::date_parser::parse_permissive;
use crate::workbook::{Cell, CellFont};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace, warn};

/// 多列写入同一字段时的合并方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMethod {
    #[default]
    Replace,
    Append,
}

/// 表示"已取消"的格式线索
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationMark {
    Strike,
    Red,
    Background,
    Foreground,
}

impl CancellationMark {
    fn is_marked(self, font: &CellFont, colours: &HashSet<String>) -> bool {
        match self {
            CancellationMark::Strike => font.strike(),
            CancellationMark::Red => font.red(),
            CancellationMark::Background => colours.contains(&font.background()),
            CancellationMark::Foreground => colours.contains(&font.foreground()),
        }
    }
}

/// 列定义中的解析选项（YAML 反序列化）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldParserOptions {
    pub extra_column: Option<String>,
    pub data_insert_method: InsertMethod,
    pub propagate_missing_values: bool,
    pub check_next_first: bool,
    pub cancellation_mark: Option<CancellationMark>,
    pub cancellation_colours: Vec<String>,
    pub extra_date_formats: Vec<String>,
    pub day_offsets: BTreeMap<String, i64>,
}

// ==========================================
// FieldParser
// ==========================================
#[derive(Debug, Clone)]
pub struct FieldParser {
    column: String,
    kind: ColumnKind,
    extra_column: Option<String>,
    insert_method: InsertMethod,
    propagate_missing_values: bool,
    check_next_first: bool,
    cancellation_mark: Option<CancellationMark>,
    cancellation_colours: HashSet<String>,
    extra_date_formats: Vec<String>,
    day_offsets: BTreeMap<String, i64>,
    value_transformers: HashMap<String, NaiveDate>,
}

impl fmt::Display for FieldParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<FieldParser({})>", self.column)
    }
}

impl FieldParser {
    /// `kind` 为目标列的声明类型，由配置加载时解析
    pub fn new(column: impl Into<String>, kind: ColumnKind, options: FieldParserOptions) -> Self {
        Self {
            column: column.into(),
            kind,
            extra_column: options.extra_column,
            insert_method: options.data_insert_method,
            propagate_missing_values: options.propagate_missing_values,
            check_next_first: options.check_next_first,
            cancellation_mark: options.cancellation_mark,
            cancellation_colours: options
                .cancellation_colours
                .iter()
                .map(|c| c.trim().trim_start_matches('#').to_lowercase())
                .collect(),
            extra_date_formats: options.extra_date_formats,
            day_offsets: options.day_offsets,
            value_transformers: HashMap::new(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn has_day_offsets(&self) -> bool {
        !self.day_offsets.is_empty()
    }

    /// 设定本工作表的周起始日期，生成 文本 → 日期 的替换表
    pub fn set_date_basis(&mut self, start_date: NaiveDate) {
        self.value_transformers = self
            .day_offsets
            .iter()
            .map(|(code, offset)| (code.clone(), start_date + Duration::days(*offset)))
            .collect();
    }

    /// 解析单元格并返回更新后的记录
    ///
    /// `previous` 为上一行最终记录（首行为空记录）。
    pub fn parse_cell(&self, cell: Cell<'_>, record: Record, previous: &Record) -> Record {
        self.parse(cell, record, Some(previous))
    }

    /// `previous` 为 None 时处于"预读下一行"模式: 只是不再向下传播
    fn parse(&self, cell: Cell<'_>, record: Record, previous: Option<&Record>) -> Record {
        trace!(
            row = cell.row(),
            col = cell.col(),
            column = %self.column,
            value = %cell.value(),
            "解析单元格"
        );
        let Some(value) = self.clean_value(cell.value(), previous.is_none()) else {
            return record;
        };
        let record = self.insert(record, &value);
        let record = self.split(record, &value);

        match previous {
            Some(previous) => {
                let record = self.propagate(cell, record, previous);
                self.detect_cancellation(cell, record)
            }
            None => self.detect_cancellation(cell, record),
        }
    }

    /// 步骤 1-4；日期无法解析时返回 None（本单元格不写入）
    fn clean_value(&self, raw: &FieldValue, lookahead: bool) -> Option<FieldValue> {
        let mut value = raw.clone();

        if !self.value_transformers.is_empty() && value.is_truthy() {
            if let Some(date) = self.value_transformers.get(value.to_text().trim()) {
                value = FieldValue::Date(*date);
            }
        }

        if self.kind == ColumnKind::Date {
            if let FieldValue::Text(text) = &value {
                if !text.is_empty() {
                    match self.parse_date_text(text) {
                        Some(date) => value = FieldValue::Date(date),
                        None if lookahead => {
                            debug!(column = %self.column, value = %text, "无法解析日期");
                            return None;
                        }
                        None => {
                            warn!(column = %self.column, value = %text, "无法解析日期");
                            return None;
                        }
                    }
                }
            }
            if let FieldValue::DateTime(dt) = value {
                value = FieldValue::Date(dt.date());
            }
        }

        if self.kind == ColumnKind::Boolean {
            if let FieldValue::Text(text) = &value {
                match text.to_lowercase().as_str() {
                    "n" | "no" => value = FieldValue::Bool(false),
                    "y" | "yes" => value = FieldValue::Bool(true),
                    _ => {}
                }
            }
        }

        Some(value)
    }

    fn parse_date_text(&self, text: &str) -> Option<NaiveDate> {
        let trimmed = text.trim();
        for format in &self.extra_date_formats {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Some(date);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(dt.date());
            }
        }
        parse_permissive(text, true)
    }

    /// 步骤 5: 追加模式下两边都有值才用空格拼接，否则覆盖
    fn insert(&self, record: Record, value: &FieldValue) -> Record {
        if self.insert_method == InsertMethod::Append && value.is_truthy() {
            if let Some(existing) = record.get(&self.column).filter(|v| v.is_truthy()) {
                let joined = format!("{} {}", existing, value);
                return record.with(&self.column, FieldValue::Text(joined));
            }
        }
        record.with(&self.column, value.clone())
    }

    /// 步骤 6: 按最后一段空白拆分，末词写主列，其余写附加列
    fn split(&self, record: Record, value: &FieldValue) -> Record {
        let Some(extra) = &self.extra_column else {
            return record;
        };
        if !value.is_truthy() {
            return record;
        }
        let (primary, secondary) = split_last_word(&value.to_text());
        record
            .with(&self.column, FieldValue::Text(primary))
            .with(extra, FieldValue::Text(secondary))
    }

    /// 步骤 7
    fn propagate(&self, cell: Cell<'_>, record: Record, previous: &Record) -> Record {
        if !self.propagate_missing_values || !record.is_blank(&self.column) {
            return record;
        }
        let mut record = record;
        if self.check_next_first {
            record = self.parse(cell.below(), record, None);
        }
        if record.is_blank(&self.column) && !previous.is_empty() {
            if let Some(value) = previous.get(&self.column) {
                if *value != FieldValue::Empty {
                    trace!(column = %self.column, value = %value, "沿用上一行的值");
                    record = record.with(&self.column, value.clone());
                }
            }
        }
        record
    }

    /// 步骤 8: 只会置为 true，不会清除
    fn detect_cancellation(&self, cell: Cell<'_>, record: Record) -> Record {
        let Some(mark) = self.cancellation_mark else {
            return record;
        };
        if mark.is_marked(&cell.font(), &self.cancellation_colours) {
            debug!(row = cell.row(), col = cell.col(), mark = ?mark, "识别到取消标记");
            record.with(CANCELLED, FieldValue::Bool(true))
        } else {
            record
        }
    }
}

/// `"Smith John"` → `("John", "Smith")`；无空白时附加部分为单个空格
fn split_last_word(text: &str) -> (String, String) {
    let trimmed = text.trim_end();
    match trimmed.rfind(char::is_whitespace) {
        Some(idx) => {
            let word_start = idx + trimmed[idx..].chars().next().map_or(1, char::len_utf8);
            let head = trimmed[..idx].trim_end_matches(char::is_whitespace);
            let head = if head.is_empty() { " " } else { head };
            (trimmed[word_start..].to_string(), head.to_string())
        }
        None => (trimmed.to_string(), " ".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::colour::Rgb;
    use crate::workbook::{Sheet, SheetFonts};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn one_column(values: Vec<FieldValue>) -> Sheet {
        Sheet::new(
            "Sheet1",
            values.into_iter().map(|v| vec![v]).collect(),
            SheetFonts::default(),
        )
    }

    fn parser(column: &str, kind: ColumnKind, options: FieldParserOptions) -> FieldParser {
        FieldParser::new(column, kind, options)
    }

    #[test]
    fn test_split_last_word() {
        assert_eq!(split_last_word("Smith John"), ("John".into(), "Smith".into()));
        assert_eq!(split_last_word("Solo"), ("Solo".into(), " ".into()));
        assert_eq!(
            split_last_word("van der Berg  Anna "),
            ("Anna".into(), "van der Berg".into())
        );
        assert_eq!(split_last_word("   "), ("".into(), " ".into()));
    }

    #[test]
    fn test_plain_text_overwrites() {
        let sheet = one_column(vec!["Knee".into()]);
        let p = parser("surgical_procedure", ColumnKind::Text, FieldParserOptions::default());
        let record = Record::new().with("surgical_procedure", "old".into());

        let record = p.parse_cell(sheet.cell(0, 0), record, &Record::new());
        assert_eq!(record.get("surgical_procedure"), Some(&FieldValue::from("Knee")));
    }

    #[test]
    fn test_append_concatenates_with_space() {
        let sheet = Sheet::new(
            "Sheet1",
            vec![vec!["A".into(), "B".into(), "".into()]],
            SheetFonts::default(),
        );
        let options = FieldParserOptions {
            data_insert_method: InsertMethod::Append,
            ..FieldParserOptions::default()
        };
        let p = parser("surgical_notes", ColumnKind::Text, options);
        let previous = Record::new();

        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &previous);
        let record = p.parse_cell(sheet.cell(0, 1), record, &previous);
        assert_eq!(record.get("surgical_notes"), Some(&FieldValue::from("A B")));

        // 空值覆盖
        let record = p.parse_cell(sheet.cell(0, 2), record, &previous);
        assert!(record.is_blank("surgical_notes"));
    }

    #[test]
    fn test_split_into_extra_column() {
        let sheet = one_column(vec!["Smith John".into(), "Solo".into()]);
        let options = FieldParserOptions {
            extra_column: Some("patient_family_name".to_string()),
            ..FieldParserOptions::default()
        };
        let p = parser("patient_given_name", ColumnKind::Text, options);

        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &Record::new());
        assert_eq!(record.get("patient_given_name"), Some(&FieldValue::from("John")));
        assert_eq!(record.get("patient_family_name"), Some(&FieldValue::from("Smith")));

        let record = p.parse_cell(sheet.cell(1, 0), Record::new(), &Record::new());
        assert_eq!(record.get("patient_given_name"), Some(&FieldValue::from("Solo")));
        assert_eq!(record.get("patient_family_name"), Some(&FieldValue::from(" ")));
    }

    #[test]
    fn test_date_formats_and_fallback() {
        let sheet = one_column(vec![
            "05.01.2024".into(),
            "5/1/2024".into(),
            "some time".into(),
            FieldValue::DateTime(date(2024, 1, 5).and_hms_opt(14, 0, 0).unwrap()),
        ]);
        let options = FieldParserOptions {
            extra_date_formats: vec!["%d.%m.%Y".to_string()],
            ..FieldParserOptions::default()
        };
        let p = parser("surgical_date", ColumnKind::Date, options);
        let expected = Some(FieldValue::Date(date(2024, 1, 5)));

        let r = p.parse_cell(sheet.cell(0, 0), Record::new(), &Record::new());
        assert_eq!(r.get("surgical_date").cloned(), expected);

        // 兜底解析按日在前
        let r = p.parse_cell(sheet.cell(1, 0), Record::new(), &Record::new());
        assert_eq!(r.get("surgical_date").cloned(), expected);

        // 无法解析: 字段不写入
        let r = p.parse_cell(sheet.cell(2, 0), Record::new(), &Record::new());
        assert_eq!(r.get("surgical_date"), None);

        let r = p.parse_cell(sheet.cell(3, 0), Record::new(), &Record::new());
        assert_eq!(r.get("surgical_date").cloned(), expected);
    }

    #[test]
    fn test_boolean_strings() {
        let sheet = one_column(vec!["Yes".into(), "n".into(), "maybe".into()]);
        let p = parser("pacu_request", ColumnKind::Boolean, FieldParserOptions::default());
        let parse = |row| {
            p.parse_cell(sheet.cell(row, 0), Record::new(), &Record::new())
                .get("pacu_request")
                .cloned()
        };
        assert_eq!(parse(0), Some(FieldValue::Bool(true)));
        assert_eq!(parse(1), Some(FieldValue::Bool(false)));
        assert_eq!(parse(2), Some(FieldValue::from("maybe")));
    }

    #[test]
    fn test_propagation_from_previous_record() {
        let sheet = one_column(vec!["".into()]);
        let options = FieldParserOptions {
            propagate_missing_values: true,
            ..FieldParserOptions::default()
        };
        let p = parser("surgical_date", ColumnKind::Date, options);
        let previous = Record::new().with("surgical_date", date(2024, 1, 5).into());

        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &previous);
        assert_eq!(record.get("surgical_date"), Some(&FieldValue::Date(date(2024, 1, 5))));

        // 首行（上一条记录为空）不传播
        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &Record::new());
        assert!(record.is_blank("surgical_date"));
    }

    #[test]
    fn test_check_next_first_prefers_next_row() {
        let sheet = one_column(vec!["".into(), "Y".into()]);
        let options = FieldParserOptions {
            propagate_missing_values: true,
            check_next_first: true,
            ..FieldParserOptions::default()
        };
        let p = parser("surgical_consultant", ColumnKind::Text, options);
        let previous = Record::new().with("surgical_consultant", "X".into());

        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &previous);
        assert_eq!(record.get("surgical_consultant"), Some(&FieldValue::from("Y")));

        // 下一行也为空（越界）时回退到上一行
        let record = p.parse_cell(sheet.cell(1, 0).below(), Record::new(), &previous);
        assert_eq!(record.get("surgical_consultant"), Some(&FieldValue::from("X")));
    }

    #[test]
    fn test_cancellation_by_background_colour() {
        let mut fonts = SheetFonts::default();
        fonts.insert(0, 0, CellFont::new(false, Rgb(0xFF, 0xFF, 0x00), Rgb::BLACK));
        fonts.insert(1, 0, CellFont::new(false, Rgb(0x00, 0xFF, 0x00), Rgb::BLACK));
        let sheet = Sheet::new(
            "Sheet1",
            vec![vec!["Knee".into()], vec!["Hip".into()]],
            fonts,
        );
        let options = FieldParserOptions {
            cancellation_mark: Some(CancellationMark::Background),
            cancellation_colours: vec!["FFFF00".to_string()],
            ..FieldParserOptions::default()
        };
        let p = parser("surgical_procedure", ColumnKind::Text, options);

        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &Record::new());
        assert_eq!(record.get(CANCELLED), Some(&FieldValue::Bool(true)));

        let record = p.parse_cell(sheet.cell(1, 0), Record::new(), &Record::new());
        assert_eq!(record.get(CANCELLED), None);
    }

    #[test]
    fn test_cancellation_by_strike_and_red() {
        let mut fonts = SheetFonts::default();
        fonts.insert(0, 0, CellFont::new(true, Rgb::WHITE, Rgb::BLACK));
        fonts.insert(1, 0, CellFont::new(false, Rgb::WHITE, Rgb(0xEE, 0x10, 0x10)));
        let sheet = Sheet::new("Sheet1", vec![vec!["a".into()], vec!["b".into()]], fonts);

        let strike = parser(
            "surgical_procedure",
            ColumnKind::Text,
            FieldParserOptions {
                cancellation_mark: Some(CancellationMark::Strike),
                ..FieldParserOptions::default()
            },
        );
        let red = parser(
            "surgical_procedure",
            ColumnKind::Text,
            FieldParserOptions {
                cancellation_mark: Some(CancellationMark::Red),
                ..FieldParserOptions::default()
            },
        );

        let r = strike.parse_cell(sheet.cell(0, 0), Record::new(), &Record::new());
        assert_eq!(r.get(CANCELLED), Some(&FieldValue::Bool(true)));
        let r = strike.parse_cell(sheet.cell(1, 0), Record::new(), &Record::new());
        assert_eq!(r.get(CANCELLED), None);
        let r = red.parse_cell(sheet.cell(1, 0), Record::new(), &Record::new());
        assert_eq!(r.get(CANCELLED), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_cancellation_seen_on_next_row_during_lookahead() {
        let mut fonts = SheetFonts::default();
        fonts.insert(1, 0, CellFont::new(true, Rgb::WHITE, Rgb::BLACK));
        let sheet = Sheet::new("Sheet1", vec![vec!["".into()], vec!["Knee".into()]], fonts);
        let options = FieldParserOptions {
            propagate_missing_values: true,
            check_next_first: true,
            cancellation_mark: Some(CancellationMark::Strike),
            ..FieldParserOptions::default()
        };
        let p = parser("surgical_procedure", ColumnKind::Text, options);

        let record = p.parse_cell(sheet.cell(0, 0), Record::new(), &Record::new());
        assert_eq!(record.get("surgical_procedure"), Some(&FieldValue::from("Knee")));
        assert_eq!(record.get(CANCELLED), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_day_offsets_after_date_basis() {
        let sheet = one_column(vec!["Mon".into(), "Wed".into(), "".into()]);
        let options = FieldParserOptions {
            day_offsets: BTreeMap::from([("Mon".to_string(), 0), ("Wed".to_string(), 2)]),
            ..FieldParserOptions::default()
        };
        let mut p = parser("surgical_date", ColumnKind::Date, options);
        assert!(p.has_day_offsets());
        p.set_date_basis(date(2024, 1, 1));

        let r = p.parse_cell(sheet.cell(1, 0), Record::new(), &Record::new());
        assert_eq!(r.get("surgical_date"), Some(&FieldValue::Date(date(2024, 1, 3))));
        let r = p.parse_cell(sheet.cell(2, 0), Record::new(), &Record::new());
        assert!(r.is_blank("surgical_date"));
    }
}
