// ==========================================
// 手术排程表导入系统 - 表格读取层
// ==========================================
// 职责: 统一 .xls / .xlsx 的 工作表/行/单元格/字体 访问
// 单元格值: calamine；字体与填充色: 按扩展名选择格式读取器
// 红线: 取消标记判定不在本层，本层只暴露字体信息
// ==========================================

pub mod colour;
pub mod error;
pub mod xls_styles;
pub mod xlsx_styles;

pub use error::{WorkbookError, WorkbookResult};

use crate::domain::FieldValue;
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use colour::Rgb;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};
use xls_styles::XlsStyleReader;
use xlsx_styles::XlsxStyleReader;

// ==========================================
// CellFont - 单元格字体/填充信息
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFont {
    strike: bool,
    background: Rgb,
    foreground: Rgb,
}

impl Default for CellFont {
    fn default() -> Self {
        Self::new(false, Rgb::WHITE, Rgb::BLACK)
    }
}

impl CellFont {
    pub fn new(strike: bool, background: Rgb, foreground: Rgb) -> Self {
        Self {
            strike,
            background,
            foreground,
        }
    }

    /// 删除线
    pub fn strike(&self) -> bool {
        self.strike
    }

    /// 填充色，小写 6 位十六进制
    pub fn background(&self) -> String {
        self.background.to_hex()
    }

    /// 文字颜色，小写 6 位十六进制
    pub fn foreground(&self) -> String {
        self.foreground.to_hex()
    }

    /// 红色文字: 红色通道 > 200
    pub fn red(&self) -> bool {
        self.foreground.0 > 200
    }
}

// ==========================================
// SheetFonts - 单工作表的字体表
// ==========================================
// 只记录与默认格式不同的单元格
#[derive(Debug, Clone, Default)]
pub struct SheetFonts {
    cells: HashMap<(usize, usize), CellFont>,
    default: CellFont,
}

impl SheetFonts {
    pub fn new(default: CellFont) -> Self {
        Self {
            cells: HashMap::new(),
            default,
        }
    }

    pub fn insert(&mut self, row: usize, col: usize, font: CellFont) {
        self.cells.insert((row, col), font);
    }

    pub fn get(&self, row: usize, col: usize) -> CellFont {
        self.cells.get(&(row, col)).copied().unwrap_or(self.default)
    }
}

/// 按文件格式读取单元格格式信息
pub trait StyleReader {
    /// 读取某工作表的字体表；工作表不存在时返回 None
    fn sheet_fonts(&mut self, sheet_name: &str) -> WorkbookResult<Option<SheetFonts>>;
}

// ==========================================
// 单元格引用
// ==========================================

/// 列字母 → 0 基列号（`A` → 0, `AA` → 26）
pub fn column_name_to_index(name: &str) -> WorkbookResult<usize> {
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(WorkbookError::InvalidCellReference(name.to_string()));
    }
    let index = name.chars().try_fold(0usize, |acc, c| {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    });
    index
        .map(|i| i - 1)
        .ok_or_else(|| WorkbookError::InvalidCellReference(name.to_string()))
}

/// A1 引用 → 0 基 (行, 列)，允许 `$` 绝对引用符
pub fn parse_cell_reference(reference: &str) -> WorkbookResult<(usize, usize)> {
    let cleaned: String = reference.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| WorkbookError::InvalidCellReference(reference.to_string()))?;
    let (letters, digits) = cleaned.split_at(split);

    let col = column_name_to_index(letters)
        .map_err(|_| WorkbookError::InvalidCellReference(reference.to_string()))?;
    let row: usize = digits
        .parse()
        .ok()
        .filter(|r| *r > 0)
        .ok_or_else(|| WorkbookError::InvalidCellReference(reference.to_string()))?;
    Ok((row - 1, col))
}

// ==========================================
// Workbook
// ==========================================
pub struct Workbook {
    values: Sheets<BufReader<File>>,
    styles: Box<dyn StyleReader>,
}

impl Workbook {
    /// 打开工作簿，按扩展名选择格式读取器
    pub fn open(path: impl AsRef<Path>) -> WorkbookResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WorkbookError::FileNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let styles: Box<dyn StyleReader> = match ext.as_str() {
            "xlsx" | "xlsm" => Box::new(XlsxStyleReader::open(path)?),
            "xls" => Box::new(XlsStyleReader::open(path)?),
            _ => return Err(WorkbookError::UnsupportedFormat(ext)),
        };
        let values = open_workbook_auto(path)?;
        debug!(path = %path.display(), format = %ext, "工作簿已打开");

        Ok(Self { values, styles })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.values.sheet_names()
    }

    /// 按顺序逐个加载工作表
    pub fn sheets(&mut self) -> SheetIter<'_> {
        let names = self.sheet_names().into_iter();
        SheetIter {
            workbook: self,
            names,
        }
    }

    /// 加载单个工作表（值 + 字体）
    pub fn sheet(&mut self, name: &str) -> WorkbookResult<Sheet> {
        let range = self.values.worksheet_range(name)?;
        let fonts = match self.styles.sheet_fonts(name)? {
            Some(fonts) => fonts,
            None => {
                warn!(sheet = name, "未找到工作表格式信息，按默认格式处理");
                SheetFonts::default()
            }
        };
        Ok(Sheet::new(name, grid(&range), fonts))
    }
}

pub struct SheetIter<'a> {
    workbook: &'a mut Workbook,
    names: std::vec::IntoIter<String>,
}

impl Iterator for SheetIter<'_> {
    type Item = WorkbookResult<Sheet>;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.next()?;
        Some(self.workbook.sheet(&name))
    }
}

/// calamine 区域 → 绝对坐标网格，每行补齐到已用区域的宽度
fn grid(range: &Range<Data>) -> Vec<Vec<FieldValue>> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let width = first_col as usize + range.width();
    let mut rows: Vec<Vec<FieldValue>> = vec![vec![FieldValue::Empty; width]; first_row as usize];
    for row in range.rows() {
        let mut cells = vec![FieldValue::Empty; first_col as usize];
        cells.extend(row.iter().map(cell_value));
        cells.resize(width, FieldValue::Empty);
        rows.push(cells);
    }
    rows
}

fn cell_value(data: &Data) -> FieldValue {
    match data {
        Data::Empty | Data::Error(_) => FieldValue::Empty,
        Data::String(s) => FieldValue::Text(s.clone()),
        Data::Int(i) => FieldValue::Number(*i as f64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::Bool(b) => FieldValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => FieldValue::Number(dt.as_f64()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => date_or_datetime(value),
            None => FieldValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(date_or_datetime)
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(FieldValue::Date))
            .unwrap_or_else(|_| FieldValue::Text(s.clone())),
        Data::DurationIso(s) => FieldValue::Text(s.clone()),
    }
}

/// 零点时间视为纯日期
fn date_or_datetime(value: NaiveDateTime) -> FieldValue {
    if value.time() == NaiveTime::MIN {
        FieldValue::Date(value.date())
    } else {
        FieldValue::DateTime(value)
    }
}

// ==========================================
// Sheet / Row / Cell
// ==========================================
#[derive(Debug, Clone)]
pub struct Sheet {
    title: String,
    rows: Vec<Vec<FieldValue>>,
    fonts: SheetFonts,
}

static EMPTY: FieldValue = FieldValue::Empty;

impl Sheet {
    pub fn new(title: impl Into<String>, rows: Vec<Vec<FieldValue>>, fonts: SheetFonts) -> Self {
        Self {
            title: title.into(),
            rows,
            fonts,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 跳过前 `skip_rows` 行后逐行迭代
    pub fn rows(&self, skip_rows: usize) -> impl Iterator<Item = Row<'_>> {
        (skip_rows..self.rows.len()).map(move |index| Row { sheet: self, index })
    }

    pub fn row(&self, index: usize) -> Row<'_> {
        Row { sheet: self, index }
    }

    /// 越界返回空单元格
    pub fn cell(&self, row: usize, col: usize) -> Cell<'_> {
        Cell {
            sheet: self,
            row,
            col,
        }
    }

    /// 按 A1 引用取单元格
    pub fn cell_by_name(&self, reference: &str) -> WorkbookResult<Cell<'_>> {
        let (row, col) = parse_cell_reference(reference)?;
        Ok(self.cell(row, col))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    sheet: &'a Sheet,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// 物理长度（xlsx/xls 读取的行已补齐到工作表已用宽度）
    pub fn len(&self) -> usize {
        self.sheet.rows.get(self.index).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell(&self, col: usize) -> Cell<'a> {
        self.sheet.cell(self.index, col)
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell<'a>> + 'a {
        let row = *self;
        (0..row.len()).map(move |col| row.cell(col))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    sheet: &'a Sheet,
    row: usize,
    col: usize,
}

impl<'a> Cell<'a> {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn value(&self) -> &'a FieldValue {
        self.sheet
            .rows
            .get(self.row)
            .and_then(|r| r.get(self.col))
            .unwrap_or(&EMPTY)
    }

    pub fn font(&self) -> CellFont {
        self.sheet.fonts.get(self.row, self.col)
    }

    /// 同列下一行
    pub fn below(&self) -> Cell<'a> {
        self.sheet.cell(self.row + 1, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        let mut fonts = SheetFonts::default();
        fonts.insert(1, 1, CellFont::new(true, Rgb(0xFF, 0xFF, 0), Rgb(0xFF, 0, 0)));
        Sheet::new(
            "Week 1",
            vec![
                vec!["Name".into(), "MRN".into()],
                vec!["Alice".into(), FieldValue::Number(1.0)],
                vec!["Bob".into()],
            ],
            fonts,
        )
    }

    #[test]
    fn test_column_name_to_index() {
        assert_eq!(column_name_to_index("A").unwrap(), 0);
        assert_eq!(column_name_to_index("z").unwrap(), 25);
        assert_eq!(column_name_to_index("AA").unwrap(), 26);
        assert_eq!(column_name_to_index("AB").unwrap(), 27);
        assert!(column_name_to_index("A1").is_err());
        assert!(column_name_to_index("").is_err());
    }

    #[test]
    fn test_parse_cell_reference() {
        assert_eq!(parse_cell_reference("B3").unwrap(), (2, 1));
        assert_eq!(parse_cell_reference("$C$1").unwrap(), (0, 2));
        assert!(parse_cell_reference("B0").is_err());
        assert!(parse_cell_reference("12").is_err());
        assert!(parse_cell_reference("B").is_err());
    }

    #[test]
    fn test_rows_and_cells() {
        let sheet = sheet();
        let rows: Vec<usize> = sheet.rows(1).map(|r| r.len()).collect();
        assert_eq!(rows, vec![2, 1]);

        let row = sheet.row(1);
        let values: Vec<String> = row.cells().map(|c| c.value().to_text()).collect();
        assert_eq!(values, vec!["Alice", "1"]);

        // 越界单元格为空
        assert!(sheet.cell(10, 10).value().is_empty());
        assert!(sheet.row(2).cell(1).value().is_empty());
        assert_eq!(sheet.cell(1, 0).below().value(), &FieldValue::from("Bob"));
    }

    #[test]
    fn test_cell_font() {
        let sheet = sheet();
        let font = sheet.cell_by_name("B2").unwrap().font();
        assert!(font.strike());
        assert!(font.red());
        assert_eq!(font.background(), "ffff00");
        assert_eq!(font.foreground(), "ff0000");

        let plain = sheet.cell(0, 0).font();
        assert!(!plain.strike());
        assert!(!plain.red());
        assert_eq!(plain.background(), "ffffff");
        assert_eq!(plain.foreground(), "000000");
    }

    #[test]
    fn test_grid_pads_rows_to_range_width() {
        let mut range: Range<Data> = Range::new((1, 1), (2, 3));
        range.set_value((1, 1), Data::String("x".to_string()));
        range.set_value((2, 2), Data::Float(3.0));
        let rows = grid(&range);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![FieldValue::Empty; 4]);
        // 行尾空单元格同样计入行长
        assert_eq!(
            rows[1],
            vec![FieldValue::Empty, "x".into(), FieldValue::Empty, FieldValue::Empty]
        );
        assert_eq!(
            rows[2],
            vec![
                FieldValue::Empty,
                FieldValue::Empty,
                FieldValue::Number(3.0),
                FieldValue::Empty
            ]
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            Workbook::open(&path),
            Err(WorkbookError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            Workbook::open(dir.path().join("missing.xlsx")),
            Err(WorkbookError::FileNotFound(_))
        ));
    }
}
