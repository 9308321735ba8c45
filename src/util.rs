// Cell parsing and display formatting shared by every view.
//
// Spreadsheet cells arrive as free text; these helpers turn them into typed
// values and turn report numbers back into Korean-locale display strings.
use chrono::{Datelike, NaiveDate};
use num_format::{Locale, ToFormattedString};

/// Parse an amount the way the spreadsheet exports need it: every non-digit
/// character is dropped (currency signs, thousands separators, units) and
/// the remaining digits are read as an integer.
///
/// Empty or fully non-numeric input yields 0. Overlong digit runs saturate.
pub fn parse_amount(s: &str) -> i64 {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<i64>().unwrap_or(i64::MAX)
}

/// Leading integer of a cell, `parseInt` style: `"12m"` is 12, `"abc"` is None.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(r) => (-1, r),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().map(|v| v * sign)
}

/// Parse the date shapes that appear across the exports:
/// `2024-03-05`, `2024-3-5`, `2024-03-05 10:00:00`, `3/5/2024` and `2024. 3. 5`.
pub fn parse_date_loose(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let head = s.split_whitespace().next().unwrap_or(s);
    if let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(head, "%m/%d/%Y") {
        return Some(d);
    }
    parse_dotted_date(s)
}

/// `2026. 1. 19` (spreadsheet locale export). A trailing dot is tolerated.
pub fn parse_dotted_date(s: &str) -> Option<NaiveDate> {
    let parts = dotted_parts(s)?;
    NaiveDate::from_ymd_opt(parts.0, parts.1, parts.2)
}

/// Year, month and day of a dotted date without validating the calendar.
/// Returns None when fewer than three numeric parts are present.
pub fn dotted_parts(s: &str) -> Option<(i32, u32, u32)> {
    let mut nums = s.split('.').map(|p| p.trim()).filter(|p| !p.is_empty());
    let y = nums.next()?.parse().ok()?;
    let m = nums.next()?.parse().ok()?;
    let d = nums.next()?.parse().ok()?;
    Some((y, m, d))
}

/// Split free-text region ("경기도 수원시 장안구") into province and the
/// remainder of the first whitespace split ("수원시").
pub fn split_region(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let region = parts.next().unwrap_or_default().to_string();
    let city = parts.next().unwrap_or_default().to_string();
    (region, city)
}

/// Year preselected in report filters: the reference year from February on,
/// the previous year in January.
pub fn default_analysis_year(reference: NaiveDate) -> i32 {
    if reference.month() >= 2 {
        reference.year()
    } else {
        reference.year() - 1
    }
}

/// Sum clamped to the `i64` range. Amount cells saturate on parse, so
/// totals over them must not overflow either.
pub fn saturating_sum(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0, i64::saturating_add)
}

/// `(value / base - 1) * 100`, defined as 0 when there is no base.
pub fn pct_change(value: f64, base: f64) -> f64 {
    if base > 0.0 {
        ((value / base) - 1.0) * 100.0
    } else {
        0.0
    }
}

/// Grouped decimal with fixed `decimals`, e.g. `-1,234.50`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (int_part, frac) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let grouped = format_int(int_part.parse::<i64>().unwrap_or(0));
    // "-0.00" reads as zero
    let sign = if n < 0.0 && fixed.bytes().any(|b| (b'1'..=b'9').contains(&b)) { "-" } else { "" };
    match frac {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::ko)
}

pub fn format_count(n: &usize) -> String {
    format_int(*n)
}

/// Won amount with grouping, e.g. `1,234,000원`.
pub fn format_currency(n: &i64) -> String {
    format!("{}원", format_int(*n))
}

pub fn format_share(pct: &f64) -> String {
    format!("{:.1}%", pct)
}

/// Deviation marker used in ranking tables: `▲ 12.5%`, `▼ 3.0%`, or `-`.
pub fn format_ratio(pct: &f64) -> String {
    if *pct == 0.0 {
        "-".to_string()
    } else if *pct > 0.0 {
        format!("▲ {:.1}%", pct)
    } else {
        format!("▼ {:.1}%", pct.abs())
    }
}
