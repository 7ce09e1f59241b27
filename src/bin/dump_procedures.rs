// 开发工具: 打印数据库中全部手术（联合患者信息），按 ID 排序
//
// 用法:
//   dump-procedures [--db 连接串] [--format text|json|csv]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use surgical_list_importer::{db, ProcedureView, Store};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Parser)]
#[command(version, about = "Print every stored procedure with its patient.")]
struct Args {
    /// Database connection string (default: $SURGICAL_LIST_DB, then the user data directory).
    #[arg(long)]
    db: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let conn_str = db::resolve_connection_string(args.db.as_deref())
        .context("无法确定数据库位置")?;
    let store = Store::open(&conn_str).with_context(|| format!("无法打开数据库: {conn_str}"))?;
    let procedures = store.all_procedures().context("读取手术列表失败")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => {
            for procedure in &procedures {
                writeln!(out, "{procedure}")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &procedures)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &procedures)?,
    }
    Ok(())
}

fn write_csv(out: &mut impl Write, procedures: &[ProcedureView]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for procedure in procedures {
        writer.serialize(procedure)?;
    }
    writer.flush()?;
    Ok(())
}
