// Base-vs-comparison trend view over the procurement records.
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tabled::Tabled;

use crate::error::ReportError;
use crate::types::TransactionRecord;
use crate::util::{format_currency, format_number, format_ratio, pct_change};

/// What the comparison year is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BaseYear {
    Year(i32),
    /// Every year in the data except the comparison year, averaged per year.
    AllAverage,
}

impl FromStr for BaseYear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" | "all_avg" | "avg" => Ok(BaseYear::AllAverage),
            other => other
                .parse::<i32>()
                .map(BaseYear::Year)
                .map_err(|_| format!("expected a year or 'all', got '{other}'")),
        }
    }
}

impl fmt::Display for BaseYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseYear::Year(y) => write!(f, "{y}년"),
            BaseYear::AllAverage => write!(f, "전체 평균"),
        }
    }
}

fn won(v: &f64) -> String {
    format!("{}원", format_number(*v, 0))
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TrendPoint {
    #[serde(rename = "Label")]
    #[tabled(rename = "구분")]
    pub label: String,
    #[serde(rename = "Base")]
    #[tabled(rename = "기준", display_with = "won")]
    pub base: f64,
    #[serde(rename = "Comparison")]
    #[tabled(rename = "분석", display_with = "format_currency")]
    pub comparison: i64,
    #[serde(rename = "Change")]
    #[tabled(rename = "증감", display_with = "format_ratio")]
    pub change: f64,
}

impl TrendPoint {
    fn new(label: String, base: f64, comparison: i64) -> Self {
        Self {
            change: pct_change(comparison as f64, base),
            label,
            base,
            comparison,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TrendComparison {
    pub base_label: String,
    pub comparison_label: String,
    /// Distinct years folded into the base series.
    pub base_years: usize,
    pub monthly: Vec<TrendPoint>,
    pub regional: Vec<TrendPoint>,
    pub agency_types: Vec<TrendPoint>,
}

/// Comparison year preselected for a data set: the reference year when it
/// has data, otherwise the newest year present.
pub fn default_comparison_year(years: &[i32], reference_year: i32) -> Option<i32> {
    if years.contains(&reference_year) {
        Some(reference_year)
    } else {
        years.iter().copied().max()
    }
}

/// Monthly, regional and agency-type series of `comparison_year` against
/// `base`. Records without a dated year take no part.
pub fn compare_trends(
    records: &[TransactionRecord],
    base: BaseYear,
    comparison_year: i32,
    product: Option<&str>,
) -> Result<TrendComparison, ReportError> {
    if base == BaseYear::Year(comparison_year) {
        return Err(ReportError::SameYear(comparison_year));
    }

    let dated: Vec<(i32, &TransactionRecord)> = records
        .iter()
        .filter(|r| product.map_or(true, |p| r.product == p))
        .filter_map(|r| r.year().map(|y| (y, r)))
        .collect();

    let comparison: Vec<&TransactionRecord> = dated
        .iter()
        .filter(|(y, _)| *y == comparison_year)
        .map(|(_, r)| *r)
        .collect();
    let base_rows: Vec<(i32, &TransactionRecord)> = dated
        .iter()
        .filter(|(y, _)| match base {
            BaseYear::Year(b) => *y == b,
            BaseYear::AllAverage => *y != comparison_year,
        })
        .copied()
        .collect();

    let base_years = base_rows.iter().map(|(y, _)| *y).collect::<BTreeSet<_>>().len();
    let divisor = match base {
        BaseYear::AllAverage if base_years > 0 => base_years as f64,
        _ => 1.0,
    };
    let base_records: Vec<&TransactionRecord> = base_rows.iter().map(|(_, r)| *r).collect();

    let base_label = match base {
        BaseYear::AllAverage => format!("{base} ({base_years}년)"),
        BaseYear::Year(_) => base.to_string(),
    };

    Ok(TrendComparison {
        base_label,
        comparison_label: format!("{comparison_year}년"),
        base_years,
        monthly: monthly_series(&base_records, &comparison, divisor),
        regional: labelled_series(&base_records, &comparison, divisor, |r| &r.region),
        agency_types: labelled_series(&base_records, &comparison, divisor, |r| &r.agency_type),
    })
}

fn monthly_totals(records: &[&TransactionRecord]) -> [i64; 12] {
    let mut out = [0i64; 12];
    for r in records {
        if let Some(m) = r.month() {
            let slot = &mut out[(m - 1) as usize];
            *slot = slot.saturating_add(r.amount);
        }
    }
    out
}

fn monthly_series(base: &[&TransactionRecord], comparison: &[&TransactionRecord], divisor: f64) -> Vec<TrendPoint> {
    let b = monthly_totals(base);
    let c = monthly_totals(comparison);
    (0..12)
        .map(|i| TrendPoint::new(format!("{}월", i + 1), b[i] as f64 / divisor, c[i]))
        .collect()
}

fn label_totals<'a, F>(records: &[&'a TransactionRecord], label: &F) -> HashMap<&'a str, i64>
where
    F: Fn(&TransactionRecord) -> &String,
{
    let mut map: HashMap<&'a str, i64> = HashMap::new();
    for &r in records {
        let total = map.entry(label(r).as_str()).or_insert(0);
        *total = total.saturating_add(r.amount);
    }
    map
}

/// One point per label in the sorted union of both sides; empty labels are
/// skipped.
fn labelled_series<F>(
    base: &[&TransactionRecord],
    comparison: &[&TransactionRecord],
    divisor: f64,
    label: F,
) -> Vec<TrendPoint>
where
    F: Fn(&TransactionRecord) -> &String,
{
    let b = label_totals(base, &label);
    let c = label_totals(comparison, &label);
    let labels: BTreeSet<&str> = b.keys().chain(c.keys()).copied().filter(|l| !l.is_empty()).collect();

    labels
        .into_iter()
        .map(|l| {
            TrendPoint::new(
                l.to_string(),
                b.get(l).copied().unwrap_or(0) as f64 / divisor,
                c.get(l).copied().unwrap_or(0),
            )
        })
        .collect()
}
