// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber，输出到标准输出
// 级别由命令行 -v 次数决定，RUST_LOG 可覆盖
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// -v 次数 → 默认过滤级别
///
/// 0: 只输出警告与错误；1: 工作表/列/新增更新；2: 表头匹配、丢弃行、日期问题；
/// 3 及以上: 逐单元格跟踪
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（优先于 verbosity）
///   例如: RUST_LOG=surgical_list_importer=trace
///
/// # 示例
/// ```no_run
/// use surgical_list_importer::logging;
/// logging::init(1);
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(7), "trace");
    }
}
