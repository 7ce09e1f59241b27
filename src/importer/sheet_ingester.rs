// ==========================================
// 手术排程表导入系统 - 工作表导入引擎
// ==========================================
// 流程:
//   1. 确定表头行（0 表示无表头）
//   2. 表头文本 / 列字母 → 列序号 → 字段解析器
//   3. 无任何匹配列: 告警并跳过整张表
//   4. 周起始日期单元格 → 各解析器的日期基准
//   5. 逐行: 表级固定值作为初始记录，各解析器依次写入
//   6. 缺必填字段: 丢弃该行（上一行指针仍前移）
//   7. 拆分为患者/手术并对账写入，每行一个保存点
//   8. 单行约束/类型错误: 只回滚该行，告警后继续
// 事务: 每张表一个事务；非单行错误中止整个导入
// ==========================================

use crate::config::IngestConfig;
use crate::domain::columns::missing_required_field;
use crate::domain::{split_record, FieldValue, Record};
use crate::importer::date_parser::parse_permissive;
use crate::importer::error::IngestResult;
use crate::importer::field_parser::FieldParser;
use crate::repository::{Session, Store, UpsertOutcome};
use crate::workbook::{column_name_to_index, Sheet, Workbook};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, info_span, trace, warn};
use uuid::Uuid;

// ==========================================
// IngestReport - 导入统计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub sheets_ingested: usize,
    pub sheets_skipped: usize,
    pub rows_added: usize,
    pub rows_updated: usize,
    /// 缺必填字段被丢弃的行
    pub rows_dropped: usize,
    /// 被存储层拒绝（约束/类型错误）的行
    pub rows_rejected: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: &IngestReport) {
        self.sheets_ingested += other.sheets_ingested;
        self.sheets_skipped += other.sheets_skipped;
        self.rows_added += other.rows_added;
        self.rows_updated += other.rows_updated;
        self.rows_dropped += other.rows_dropped;
        self.rows_rejected += other.rows_rejected;
    }

    /// 写入存储的行数（新增 + 更新）
    pub fn rows_stored(&self) -> usize {
        self.rows_added + self.rows_updated
    }
}

// ==========================================
// 入口
// ==========================================

/// 导入一个表格文件
///
/// # 参数
/// - `path`: 表格文件（.xls / .xlsx / .xlsm）
/// - `config_path`: 配置文件；None 时使用同名 .yaml
/// - `store`: 目标存储
pub fn ingest_file(
    path: impl AsRef<Path>,
    config_path: Option<&Path>,
    store: &mut Store,
) -> IngestResult<IngestReport> {
    let path = path.as_ref();
    let span = info_span!("ingest", run_id = %Uuid::new_v4(), path = %path.display());
    let _guard = span.enter();

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| IngestConfig::default_path_for(path));
    debug!(config = %config_path.display(), "读取导入配置");
    let config = IngestConfig::read(&config_path)?;

    let mut workbook = Workbook::open(path)?;
    let report = ingest_workbook(&mut workbook, &config, store)?;

    info!(
        sheets = report.sheets_ingested,
        added = report.rows_added,
        updated = report.rows_updated,
        dropped = report.rows_dropped,
        rejected = report.rows_rejected,
        "导入完成"
    );
    Ok(report)
}

/// 按配置导入已打开工作簿的全部（选定）工作表
pub fn ingest_workbook(
    workbook: &mut Workbook,
    config: &IngestConfig,
    store: &mut Store,
) -> IngestResult<IngestReport> {
    let mut report = IngestReport::default();

    for sheet in workbook.sheets() {
        let sheet = sheet?;
        if !config.includes_sheet(sheet.title()) {
            debug!(sheet = sheet.title(), "工作表不在导入范围内");
            report.sheets_skipped += 1;
            continue;
        }

        let sheet_report = store.scope(|session| ingest_sheet(&sheet, config, session))?;
        report.merge(&sheet_report);
    }

    Ok(report)
}

/// 导入单张工作表（在调用方的事务内）
pub fn ingest_sheet(
    sheet: &Sheet,
    config: &IngestConfig,
    session: &mut Session<'_>,
) -> IngestResult<IngestReport> {
    let span = info_span!("sheet", sheet = %sheet.title());
    let _guard = span.enter();
    info!(rows = sheet.row_count(), "开始导入工作表");
    let mut report = IngestReport::default();

    let mut parsers = map_columns(sheet, config);
    if parsers.is_empty() {
        warn!("工作表中没有任何已配置的列，跳过");
        report.sheets_skipped = 1;
        return Ok(report);
    }
    for (col, parser) in &parsers {
        info!(col, column = parser.column(), "找到列");
    }

    if let Some(start) = week_start_date(sheet, config)? {
        debug!(%start, "周起始日期");
        for (_, parser) in parsers.iter_mut().filter(|(_, p)| p.has_day_offsets()) {
            parser.set_date_basis(start);
        }
    }

    let mut previous = Record::new();
    for row in sheet.rows(config.heading_row) {
        let row_number = row.index() + 1;
        let mut record = config.seed_record();
        for (col, parser) in &parsers {
            // 短行: 超出行长的列跳过
            if *col >= row.len() {
                continue;
            }
            record = parser.parse_cell(row.cell(*col), record, &previous);
        }
        trace!(row = row_number, ?record, "行解析完成");

        if let Some(missing) = missing_required_field(&record) {
            debug!(row = row_number, missing, "缺少必填字段，丢弃该行");
            report.rows_dropped += 1;
            previous = record;
            continue;
        }

        match split_record(&record) {
            Ok((patient, procedure)) => {
                match session.row_scope(|repo| repo.upsert(&patient, &procedure)) {
                    Ok(UpsertOutcome::Added(_)) => report.rows_added += 1,
                    Ok(UpsertOutcome::Updated(_)) => report.rows_updated += 1,
                    Err(err) if err.is_row_level() => {
                        warn!(row = row_number, error = %err, "写入失败，已回滚该行");
                        report.rows_rejected += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Err(err) => {
                warn!(row = row_number, error = %err, "字段类型错误，跳过该行");
                report.rows_rejected += 1;
            }
        }
        previous = record;
    }

    report.sheets_ingested = 1;
    Ok(report)
}

// ==========================================
// 内部步骤
// ==========================================

/// 列序号 → 本表专用的解析器副本
/// 表头模式按列序号升序；无表头模式保持配置顺序
fn map_columns(sheet: &Sheet, config: &IngestConfig) -> Vec<(usize, FieldParser)> {
    if config.headerless() {
        config
            .columns
            .iter()
            .filter_map(|(letter, parser)| match column_name_to_index(letter) {
                Ok(col) => Some((col, parser.clone())),
                Err(err) => {
                    warn!(column = %letter, error = %err, "无效的列字母");
                    None
                }
            })
            .collect()
    } else {
        let mut parsers: Vec<(usize, FieldParser)> = sheet
            .row(config.heading_row - 1)
            .cells()
            .filter_map(|cell| {
                let heading = cell.value().to_text();
                let heading = heading.trim();
                match config.parser_for(heading) {
                    Some(parser) => Some((cell.col(), parser.clone())),
                    None => {
                        if !heading.is_empty() {
                            debug!(heading, "表头未配置，忽略");
                        }
                        None
                    }
                }
            })
            .collect();
        parsers.sort_by_key(|(col, _)| *col);
        parsers
    }
}

/// 读取并解析周起始日期单元格；未配置或为空时返回 None
fn week_start_date(sheet: &Sheet, config: &IngestConfig) -> IngestResult<Option<NaiveDate>> {
    let Some(reference) = config.week_start_date_cell.as_deref() else {
        return Ok(None);
    };
    let cell = sheet.cell_by_name(reference)?;
    let value = cell.value();
    if !value.is_truthy() {
        return Ok(None);
    }

    let date = match value {
        FieldValue::Date(d) => Some(*d),
        FieldValue::DateTime(dt) => Some(dt.date()),
        FieldValue::Text(text) => parse_permissive(text, false),
        _ => None,
    };
    if date.is_none() {
        warn!(cell = reference, value = %value, "无法解析周起始日期");
    }
    Ok(date)
}
