// ==========================================
// 手术排程表导入系统 - xls (BIFF8) 格式信息读取
// ==========================================
// 职责: 从 Workbook 流读取 FONT / XF / PALETTE / BOUNDSHEET，
//       再扫描各工作表子流中单元格记录的 XF 下标
// 工具: cfb 打开复合文档
// ==========================================

use crate::workbook::colour::{Palette, Rgb};
use crate::workbook::error::{WorkbookError, WorkbookResult};
use crate::workbook::{CellFont, SheetFonts, StyleReader};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

// ===== 记录类型 =====
const RECORD_BOF: u16 = 0x0809;
const RECORD_EOF: u16 = 0x000A;
const RECORD_FONT: u16 = 0x0031;
const RECORD_XF: u16 = 0x00E0;
const RECORD_PALETTE: u16 = 0x0092;
const RECORD_BOUNDSHEET: u16 = 0x0085;

const RECORD_FORMULA: u16 = 0x0006;
const RECORD_BLANK: u16 = 0x0201;
const RECORD_NUMBER: u16 = 0x0203;
const RECORD_LABEL: u16 = 0x0204;
const RECORD_BOOLERR: u16 = 0x0205;
const RECORD_RK: u16 = 0x027E;
const RECORD_RSTRING: u16 = 0x00D6;
const RECORD_LABELSST: u16 = 0x00FD;
const RECORD_MULRK: u16 = 0x00BD;
const RECORD_MULBLANK: u16 = 0x00BE;

const BOF_VERSION_BIFF8: u16 = 0x0600;
const FONT_STRIKE: u16 = 0x0008;
const COLOUR_AUTO: u16 = 0x7FFF;

// ==========================================
// 记录迭代
// ==========================================
struct Records<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Records<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.data.get(self.pos..self.pos + 4)?;
        let id = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let start = self.pos + 4;
        // 截断的记录视为流结束
        let payload = self.data.get(start..start + len)?;
        self.pos = start + len;
        Some((id, payload))
    }
}

fn u16_at(payload: &[u8], offset: usize) -> Option<u16> {
    payload
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(payload: &[u8], offset: usize) -> Option<u32> {
    payload
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// 短字符串: cch(u8) + flags(u8) + 字符（flags bit0 = UTF-16LE）
fn short_string(bytes: &[u8]) -> Option<String> {
    let cch = *bytes.first()? as usize;
    let flags = *bytes.get(1)?;
    let chars = bytes.get(2..)?;
    if flags & 0x01 != 0 {
        let units: Vec<u16> = chars
            .get(..cch * 2)?
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    } else {
        Some(chars.get(..cch)?.iter().map(|&b| char::from(b)).collect())
    }
}

// ==========================================
// 全局子流
// ==========================================
#[derive(Debug, Clone, Copy)]
struct FontRecord {
    strike: bool,
    colour: u16,
}

#[derive(Debug, Clone, Copy)]
struct XfRecord {
    font: usize,
    fill_pattern: u32,
    pattern_colour: u16,
    background_colour: u16,
}

#[derive(Debug, Default)]
struct Globals {
    fonts: Vec<FontRecord>,
    xfs: Vec<XfRecord>,
    palette: Palette,
    sheets: Vec<(String, usize)>,
}

fn parse_globals(stream: &[u8]) -> WorkbookResult<Globals> {
    let mut globals = Globals::default();
    let mut records = Records::new(stream);

    match records.next() {
        Some((RECORD_BOF, payload)) => {
            let version = u16_at(payload, 0).unwrap_or(0);
            if version != BOF_VERSION_BIFF8 {
                warn!(version, "非 BIFF8 工作簿，忽略格式信息");
                return Ok(globals);
            }
        }
        _ => return Err(WorkbookError::Biff("Workbook 流缺少 BOF 记录".to_string())),
    }

    for (id, payload) in records {
        match id {
            RECORD_EOF => break,
            RECORD_FONT => {
                let grbit = u16_at(payload, 2).unwrap_or(0);
                let colour = u16_at(payload, 4).unwrap_or(COLOUR_AUTO);
                // 字体下标 4 不存在，占位后保持下标对齐
                if globals.fonts.len() == 4 {
                    let placeholder = globals.fonts[0];
                    globals.fonts.push(placeholder);
                }
                globals.fonts.push(FontRecord {
                    strike: grbit & FONT_STRIKE != 0,
                    colour,
                });
            }
            RECORD_XF => {
                let colours = u16_at(payload, 18).unwrap_or(0);
                globals.xfs.push(XfRecord {
                    font: u16_at(payload, 0).unwrap_or(0) as usize,
                    fill_pattern: (u32_at(payload, 14).unwrap_or(0) & 0xFC00_0000) >> 26,
                    pattern_colour: colours & 0x7F,
                    background_colour: (colours >> 7) & 0x7F,
                });
            }
            RECORD_PALETTE => {
                let count = u16_at(payload, 0).unwrap_or(0) as usize;
                let colours: Vec<Rgb> = (0..count)
                    .filter_map(|i| payload.get(2 + i * 4..2 + i * 4 + 3))
                    .map(|c| Rgb(c[0], c[1], c[2]))
                    .collect();
                globals.palette.override_from(8, &colours);
            }
            RECORD_BOUNDSHEET => {
                let offset = u32_at(payload, 0);
                let name = payload.get(6..).and_then(short_string);
                if let (Some(offset), Some(name)) = (offset, name) {
                    globals.sheets.push((name, offset as usize));
                }
            }
            _ => {}
        }
    }
    Ok(globals)
}

fn resolve_cell_formats(globals: &Globals) -> Vec<CellFont> {
    let colour = |index: u16| -> Option<Rgb> {
        if index == COLOUR_AUTO {
            return None;
        }
        globals.palette.get(u32::from(index))
    };

    globals
        .xfs
        .iter()
        .map(|xf| {
            let font = globals.fonts.get(xf.font);
            let foreground = font.and_then(|f| colour(f.colour)).unwrap_or(Rgb::BLACK);
            let background = match xf.fill_pattern {
                0 => colour(xf.background_colour),
                1 => colour(xf.pattern_colour),
                _ => None,
            }
            .unwrap_or(Rgb::WHITE);
            CellFont::new(font.is_some_and(|f| f.strike), background, foreground)
        })
        .collect()
}

// ==========================================
// 工作表子流: 单元格 → XF 下标
// ==========================================
fn scan_sheet(stream: &[u8], cell_formats: &[CellFont]) -> SheetFonts {
    let mut fonts = SheetFonts::new(CellFont::default());
    let mut depth = 0usize;

    let mut record_cell = |row: u16, col: u16, xf: u16| {
        if let Some(font) = cell_formats.get(xf as usize) {
            if *font != CellFont::default() {
                fonts.insert(row as usize, col as usize, *font);
            }
        }
    };

    for (id, payload) in Records::new(stream) {
        match id {
            RECORD_BOF => depth += 1,
            RECORD_EOF => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            RECORD_FORMULA | RECORD_BLANK | RECORD_NUMBER | RECORD_LABEL | RECORD_BOOLERR
            | RECORD_RK | RECORD_RSTRING | RECORD_LABELSST => {
                if let (Some(row), Some(col), Some(xf)) =
                    (u16_at(payload, 0), u16_at(payload, 2), u16_at(payload, 4))
                {
                    record_cell(row, col, xf);
                }
            }
            RECORD_MULRK | RECORD_MULBLANK => {
                let (Some(row), Some(first_col)) = (u16_at(payload, 0), u16_at(payload, 2)) else {
                    continue;
                };
                // MULRK: (ixfe, rk) 6 字节一组；MULBLANK: ixfe 2 字节一组；末尾 2 字节为 colLast
                let stride = if id == RECORD_MULRK { 6 } else { 2 };
                let count = payload.len().saturating_sub(6) / stride;
                for i in 0..count {
                    // 列号超出 u16 的部分忽略
                    let Some(col) = u16::try_from(i).ok().and_then(|i| first_col.checked_add(i))
                    else {
                        break;
                    };
                    if let Some(xf) = u16_at(payload, 4 + i * stride) {
                        record_cell(row, col, xf);
                    }
                }
            }
            _ => {}
        }
    }
    fonts
}

// ==========================================
// XlsStyleReader
// ==========================================
pub struct XlsStyleReader {
    stream: Vec<u8>,
    sheets: Vec<(String, usize)>,
    cell_formats: Vec<CellFont>,
}

impl XlsStyleReader {
    pub fn open(path: &Path) -> WorkbookResult<Self> {
        let mut compound = cfb::open(path)?;
        let mut stream = None;
        for candidate in ["/Workbook", "/Book"] {
            if let Ok(s) = compound.open_stream(candidate) {
                stream = Some(s);
                break;
            }
        }
        let mut stream = stream
            .ok_or_else(|| WorkbookError::Biff("缺少 Workbook / Book 流".to_string()))?;

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Self::from_stream(bytes)
    }

    pub(crate) fn from_stream(stream: Vec<u8>) -> WorkbookResult<Self> {
        let globals = parse_globals(&stream)?;
        let cell_formats = resolve_cell_formats(&globals);
        debug!(
            fonts = globals.fonts.len(),
            cell_formats = cell_formats.len(),
            sheets = globals.sheets.len(),
            "xls 格式信息已加载"
        );
        Ok(Self {
            stream,
            sheets: globals.sheets,
            cell_formats,
        })
    }
}

impl StyleReader for XlsStyleReader {
    fn sheet_fonts(&mut self, sheet_name: &str) -> WorkbookResult<Option<SheetFonts>> {
        let Some(&(_, offset)) = self.sheets.iter().find(|(name, _)| name == sheet_name) else {
            return Ok(None);
        };
        let Some(substream) = self.stream.get(offset..) else {
            return Err(WorkbookError::Biff(format!(
                "工作表 {} 的偏移 {} 超出流长度",
                sheet_name, offset
            )));
        };
        Ok(Some(scan_sheet(substream, &self.cell_formats)))
    }
}
