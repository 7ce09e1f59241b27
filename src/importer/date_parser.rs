// ==========================================
// 手术排程表导入系统 - 宽松日期解析
// ==========================================
// 职责: 配置格式全部失败后的兜底解析（非模糊模式）
// 支持: 纯数字日期（日/月顺序可配）、英文月份名、序数后缀、
//       星期名与时间部分（忽略）
// 红线: 出现无法识别的词即判定失败，不做模糊匹配
// ==========================================

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};

/// 先试的 ISO 类格式（年份在前，无歧义）
const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];
const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];
/// 可跳过的连接词
const SKIP_WORDS: [&str; 6] = ["at", "on", "and", "of", "am", "pm"];

/// 宽松解析日期；`day_first` 决定 `05/01/2024` 的日月顺序
pub fn parse_permissive(text: &str, day_first: bool) -> Option<NaiveDate> {
    parse_permissive_on(text, day_first, Local::now().date_naive())
}

/// 同 [`parse_permissive`]，缺失的年/月取自 `today`
pub fn parse_permissive_on(text: &str, day_first: bool, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in ISO_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    for format in ISO_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    let mut numbers: Vec<&str> = Vec::new();
    let mut month_name: Option<u32> = None;

    for token in text
        .split(|c: char| c.is_whitespace() || matches!(c, '/' | '-' | '.' | ','))
        .filter(|t| !t.is_empty())
    {
        let lower = token.to_lowercase();
        if is_time(&lower) || SKIP_WORDS.contains(&lower.as_str()) || is_weekday(&lower) {
            continue;
        }
        if let Some(month) = month_number(&lower) {
            if month_name.replace(month).is_some() {
                return None;
            }
            continue;
        }
        let digits = strip_ordinal(&lower);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            numbers.push(&token[..digits.len()]);
            continue;
        }
        return None;
    }

    match month_name {
        Some(month) => with_month_name(&numbers, month, today),
        None => numeric_only(&numbers, day_first, today),
    }
}

fn is_time(token: &str) -> bool {
    let token = token.trim_end_matches("am").trim_end_matches("pm");
    token.contains(':')
        && token
            .split(':')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn is_weekday(token: &str) -> bool {
    token.len() >= 3 && WEEKDAYS.iter().any(|day| day.starts_with(token))
}

fn month_number(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    // "sept" 也视为九月
    let token = if token == "sept" { "sep" } else { token };
    MONTHS
        .iter()
        .position(|m| m.starts_with(token))
        .map(|idx| idx as u32 + 1)
}

fn strip_ordinal(token: &str) -> &str {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            return stripped;
        }
    }
    token
}

fn with_month_name(numbers: &[&str], month: u32, today: NaiveDate) -> Option<NaiveDate> {
    match numbers {
        [day] => NaiveDate::from_ymd_opt(today.year(), month, day.parse().ok()?),
        [a, b] => {
            // 四位数或大于 31 的为年份，否则按 日 年 顺序
            let (day, year) = if is_year(a) && !is_year(b) { (b, a) } else { (a, b) };
            NaiveDate::from_ymd_opt(expand_year(year, today)?, month, day.parse().ok()?)
        }
        _ => None,
    }
}

fn numeric_only(numbers: &[&str], day_first: bool, today: NaiveDate) -> Option<NaiveDate> {
    match numbers {
        [single] if single.len() == 8 => NaiveDate::parse_from_str(single, "%Y%m%d").ok(),
        [single] if single.len() == 6 => {
            let year = expand_year(&single[0..2], today)?;
            NaiveDate::from_ymd_opt(year, single[2..4].parse().ok()?, single[4..6].parse().ok()?)
        }
        [day] if day.len() <= 2 => NaiveDate::from_ymd_opt(today.year(), today.month(), day.parse().ok()?),
        [a, b] => day_month(a.parse().ok()?, b.parse().ok()?, today.year(), day_first),
        [a, b, c] if is_year(a) => {
            NaiveDate::from_ymd_opt(expand_year(a, today)?, b.parse().ok()?, c.parse().ok()?)
        }
        [a, b, c] => day_month(
            a.parse().ok()?,
            b.parse().ok()?,
            expand_year(c, today)?,
            day_first,
        ),
        _ => None,
    }
}

/// 按偏好顺序组合日/月；偏好顺序无效时尝试交换
fn day_month(first: u32, second: u32, year: i32, day_first: bool) -> Option<NaiveDate> {
    let (day, month) = if day_first { (first, second) } else { (second, first) };
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

fn is_year(token: &str) -> bool {
    token.len() >= 3 || token.parse::<u32>().is_ok_and(|n| n > 31)
}

/// 两位年份取距今 50 年以内的世纪
fn expand_year(token: &str, today: NaiveDate) -> Option<i32> {
    let year: i32 = token.parse().ok()?;
    if token.len() > 2 {
        return Some(year);
    }
    let current = today.year();
    let mut full = current / 100 * 100 + year;
    if full >= current + 50 {
        full -= 100;
    } else if full < current - 50 {
        full += 100;
    }
    Some(full)
}
