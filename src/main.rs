// ==========================================
// 手术排程表导入系统 - 命令行入口
// ==========================================
// 用法: surgical-list-importer <表格文件> [-v...] [--config 路径] [--db 连接串]
// 配置文件缺省为表格同名 .yaml；数据库缺省取 SURGICAL_LIST_DB 或用户数据目录
// ==========================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use surgical_list_importer::{db, ingest_file, logging, Store};

#[derive(Parser)]
#[command(version, about = "Import a planned-surgery spreadsheet into the procedure database.")]
struct Args {
    /// Spreadsheet to import (.xls, .xlsx or .xlsm).
    xls_file: PathBuf,

    /// Increase log detail (repeatable: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Import configuration (default: the spreadsheet path with a .yaml extension).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database connection string (default: $SURGICAL_LIST_DB, then the user data directory).
    #[arg(long)]
    db: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let conn_str = db::resolve_connection_string(args.db.as_deref())
        .context("无法确定数据库位置")?;
    tracing::info!(db = %conn_str, version = surgical_list_importer::VERSION, "使用数据库");

    let mut store =
        Store::open(&conn_str).with_context(|| format!("无法打开数据库: {conn_str}"))?;
    let report = ingest_file(&args.xls_file, args.config.as_deref(), &mut store)
        .with_context(|| format!("导入失败: {}", args.xls_file.display()))?;

    tracing::info!(
        stored = report.rows_stored(),
        skipped_sheets = report.sheets_skipped,
        "完成"
    );
    Ok(())
}
