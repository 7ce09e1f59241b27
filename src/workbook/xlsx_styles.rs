// ==========================================
// 手术排程表导入系统 - xlsx 格式信息读取
// ==========================================
// 职责: 解析 styles.xml / theme1.xml，得到每个单元格的字体与填充色
// 工具: zip 读包, roxmltree 解析样式部件, quick-xml 流式扫描工作表
// ==========================================

use crate::workbook::colour::{default_theme_colours, ColourSpec, Palette, Rgb, THEME_SLOTS};
use crate::workbook::error::{WorkbookError, WorkbookResult};
use crate::workbook::{parse_cell_reference, CellFont, SheetFonts, StyleReader};
use quick_xml::events::Event;
use quick_xml::Reader;
use roxmltree::{Document, Node};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const THEME_PART: &str = "xl/theme/theme1.xml";

// ==========================================
// XlsxStyleReader
// ==========================================
pub struct XlsxStyleReader {
    archive: ZipArchive<File>,
    sheet_parts: Vec<(String, String)>, // (工作表名, 包内路径)
    cell_formats: Vec<CellFont>,        // 按 cellXfs 下标
}

impl XlsxStyleReader {
    pub fn open(path: &Path) -> WorkbookResult<Self> {
        let mut archive = ZipArchive::new(File::open(path)?)?;

        let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?
            .ok_or_else(|| WorkbookError::xml(WORKBOOK_PART, "部件缺失"))?;
        let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
        let sheet_parts = parse_sheet_parts(&workbook_xml, rels_xml.as_deref())?;

        let theme = match read_part(&mut archive, THEME_PART)? {
            Some(xml) => parse_theme_colours(&xml)?,
            None => default_theme_colours(),
        };
        let cell_formats = match read_part(&mut archive, STYLES_PART)? {
            Some(xml) => parse_cell_formats(&xml, &theme)?,
            None => Vec::new(),
        };
        debug!(
            sheets = sheet_parts.len(),
            cell_formats = cell_formats.len(),
            "xlsx 格式信息已加载"
        );

        Ok(Self {
            archive,
            sheet_parts,
            cell_formats,
        })
    }
}

impl StyleReader for XlsxStyleReader {
    fn sheet_fonts(&mut self, sheet_name: &str) -> WorkbookResult<Option<SheetFonts>> {
        let Some((_, part)) = self.sheet_parts.iter().find(|(name, _)| name == sheet_name) else {
            return Ok(None);
        };
        let part = part.clone();
        let file = match self.archive.by_name(&part) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        scan_sheet_styles(BufReader::new(file), &part, &self.cell_formats).map(Some)
    }
}

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> WorkbookResult<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

// ==========================================
// 工作表 → 包内路径
// ==========================================
pub(crate) fn parse_sheet_parts(
    workbook_xml: &str,
    rels_xml: Option<&str>,
) -> WorkbookResult<Vec<(String, String)>> {
    let workbook = Document::parse(workbook_xml).map_err(|e| WorkbookError::xml(WORKBOOK_PART, e))?;
    let rels_doc = rels_xml
        .map(Document::parse)
        .transpose()
        .map_err(|e| WorkbookError::xml(WORKBOOK_RELS_PART, e))?;

    let target_of = |rel_id: &str| -> Option<String> {
        let rels = rels_doc.as_ref()?;
        let rel = elements(rels.root_element(), "Relationship")
            .find(|r| r.attribute("Id") == Some(rel_id))?;
        let target = rel.attribute("Target")?;
        Some(match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{}", target),
        })
    };

    let Some(sheets) = child(workbook.root_element(), "sheets") else {
        return Ok(Vec::new());
    };
    let parts = elements(sheets, "sheet")
        .enumerate()
        .filter_map(|(idx, sheet)| {
            let name = sheet.attribute("name")?.to_string();
            let rel_id = sheet
                .attributes()
                .find(|a| a.name() == "id" && a.namespace().is_some())
                .map(|a| a.value().to_string());
            let part = rel_id
                .as_deref()
                .and_then(&target_of)
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", idx + 1));
            Some((name, part))
        })
        .collect();
    Ok(parts)
}

// ==========================================
// 主题色
// ==========================================
pub(crate) fn parse_theme_colours(xml: &str) -> WorkbookResult<Vec<Rgb>> {
    let doc = Document::parse(xml).map_err(|e| WorkbookError::xml(THEME_PART, e))?;
    let mut colours = default_theme_colours();

    let Some(scheme) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "clrScheme")
    else {
        return Ok(colours);
    };

    for (slot, name) in THEME_SLOTS.iter().enumerate() {
        if let Some(rgb) = child(scheme, name).and_then(parse_scheme_entry) {
            colours[slot] = rgb;
        }
    }
    Ok(colours)
}

fn parse_scheme_entry(entry: Node<'_, '_>) -> Option<Rgb> {
    let clr = entry.children().find(|n| n.is_element())?;
    match clr.tag_name().name() {
        "srgbClr" => clr.attribute("val").and_then(Rgb::from_hex),
        // 系统色优先取 lastClr
        "sysClr" => clr
            .attribute("lastClr")
            .and_then(Rgb::from_hex)
            .or_else(|| match clr.attribute("val") {
                Some("windowText") => Some(Rgb::BLACK),
                Some("window") => Some(Rgb::WHITE),
                _ => None,
            }),
        _ => None,
    }
}

// ==========================================
// styles.xml → 每个 cellXfs 的字体信息
// ==========================================
struct FontEntry {
    strike: bool,
    colour: Option<ColourSpec>,
}

pub(crate) fn parse_cell_formats(xml: &str, theme: &[Rgb]) -> WorkbookResult<Vec<CellFont>> {
    let doc = Document::parse(xml).map_err(|e| WorkbookError::xml(STYLES_PART, e))?;
    let root = doc.root_element();

    let mut palette = Palette::default();
    if let Some(indexed) = child(root, "colors").and_then(|c| child(c, "indexedColors")) {
        let colours: Vec<Rgb> = elements(indexed, "rgbColor")
            .filter_map(|n| n.attribute("rgb").and_then(Rgb::from_hex))
            .collect();
        palette.override_from(0, &colours);
    }

    let fonts: Vec<FontEntry> = child(root, "fonts")
        .map(|f| elements(f, "font").map(parse_font).collect())
        .unwrap_or_default();
    let fills: Vec<Option<ColourSpec>> = child(root, "fills")
        .map(|f| elements(f, "fill").map(parse_fill).collect())
        .unwrap_or_default();

    let Some(xfs) = child(root, "cellXfs") else {
        return Ok(Vec::new());
    };
    let formats = elements(xfs, "xf")
        .map(|xf| {
            let font = index_attr(xf, "fontId").and_then(|i| fonts.get(i));
            let fill = index_attr(xf, "fillId").and_then(|i| fills.get(i)).copied().flatten();

            let foreground = font
                .and_then(|f| f.colour)
                .map_or(Rgb::BLACK, |c| c.resolve(&palette, theme, Rgb::BLACK));
            let background = fill.map_or(Rgb::WHITE, |c| c.resolve(&palette, theme, Rgb::WHITE));
            CellFont::new(font.is_some_and(|f| f.strike), background, foreground)
        })
        .collect();
    Ok(formats)
}

fn index_attr(node: Node<'_, '_>, name: &str) -> Option<usize> {
    node.attribute(name).and_then(|v| v.parse().ok())
}

fn parse_font(font: Node<'_, '_>) -> FontEntry {
    let strike = child(font, "strike")
        .is_some_and(|s| !matches!(s.attribute("val"), Some("0") | Some("false")));
    FontEntry {
        strike,
        colour: child(font, "color").and_then(parse_colour),
    }
}

fn parse_fill(fill: Node<'_, '_>) -> Option<ColourSpec> {
    let pattern = child(fill, "patternFill")?;
    match pattern.attribute("patternType") {
        None | Some("none") => None,
        // 有图案时取图案前景色
        Some(_) => child(pattern, "fgColor").and_then(parse_colour),
    }
}

fn parse_colour(node: Node<'_, '_>) -> Option<ColourSpec> {
    if let Some(rgb) = node.attribute("rgb").and_then(Rgb::from_hex) {
        return Some(ColourSpec::Rgb(rgb));
    }
    if let Some(index) = node.attribute("theme").and_then(|v| v.parse().ok()) {
        let tint = node
            .attribute("tint")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        return Some(ColourSpec::Theme { index, tint });
    }
    if let Some(index) = node.attribute("indexed").and_then(|v| v.parse().ok()) {
        return Some(ColourSpec::Indexed(index));
    }
    if matches!(node.attribute("auto"), Some("1") | Some("true")) {
        return Some(ColourSpec::Auto);
    }
    None
}

// ==========================================
// 工作表流式扫描: <c r=".." s=".."> → 单元格字体
// ==========================================
pub(crate) fn scan_sheet_styles<R: BufRead>(
    source: R,
    part: &str,
    cell_formats: &[CellFont],
) -> WorkbookResult<SheetFonts> {
    let default = cell_formats.first().copied().unwrap_or_default();
    let mut fonts = SheetFonts::new(default);
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();

    let mut current_row: Option<usize> = None;
    let mut next_col = 0usize;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| WorkbookError::xml(part, e))?
        {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let r = e
                        .try_get_attribute("r")
                        .map_err(|err| WorkbookError::xml(part, err))?
                        .and_then(|a| std::str::from_utf8(&a.value).ok()?.parse::<usize>().ok());
                    current_row = Some(match (r, current_row) {
                        (Some(r), _) => r.saturating_sub(1),
                        (None, Some(prev)) => prev + 1,
                        (None, None) => 0,
                    });
                    next_col = 0;
                }
                b"c" => {
                    let reference = e
                        .try_get_attribute("r")
                        .map_err(|err| WorkbookError::xml(part, err))?
                        .and_then(|a| String::from_utf8(a.value.into_owned()).ok());
                    let style = e
                        .try_get_attribute("s")
                        .map_err(|err| WorkbookError::xml(part, err))?
                        .and_then(|a| std::str::from_utf8(&a.value).ok()?.parse::<usize>().ok())
                        .unwrap_or(0);

                    let (row, col) = reference
                        .as_deref()
                        .and_then(|r| parse_cell_reference(r).ok())
                        .unwrap_or((current_row.unwrap_or(0), next_col));
                    next_col = col + 1;

                    if let Some(font) = cell_formats.get(style) {
                        if *font != default {
                            fonts.insert(row, col, *font);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(fonts)
}
