// Monthly sales view.
//
// Every sheet row turns into one order-side entry and, once invoiced, a
// revenue entry dated at the invoice. Summaries bucket entries per calendar
// month and category; counts are distinct "contract-customer" keys.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use crate::error::ReportError;
use crate::sort::{sort_rows, Align, Column, SortKind, SortState, SortValue, TableRow};
use crate::types::RawRow;
use crate::util::{format_count, format_currency, parse_amount, parse_date_loose, saturating_sum};

pub mod columns {
    /// Tried in order; the first non-empty one is the record date.
    pub const DATE: [&str; 3] = ["날짜", "주문일자", "기준일자"];
    pub const INVOICE: &str = "세금계산서";
    pub const KIND: &str = "구분";
    pub const CONTRACT: &str = "계약명";
    pub const CUSTOMER: &str = "거래처";
    pub const AMOUNT: &str = "합계";
    pub const ITEM: &str = "품목구분";
    pub const SPEC: &str = "규격";
    pub const QUANTITY: &str = "수량";
    pub const UNIT_PRICE: &str = "단가";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    Order,
    Delivered,
    Government,
    Private,
}

impl EntryKind {
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Order => "주문",
            EntryKind::Delivered => "납품완료",
            EntryKind::Government => "관급매출",
            EntryKind::Private => "사급매출",
        }
    }

    pub fn category(self) -> Category {
        match self {
            EntryKind::Order | EntryKind::Delivered => Category::Order,
            EntryKind::Government => Category::Government,
            EntryKind::Private => Category::Private,
        }
    }
}

/// Column group of the monthly table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Order,
    Government,
    Private,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Order => "주문",
            Category::Government => "관급매출",
            Category::Private => "사급매출",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "order" | "주문" => Ok(Category::Order),
            "government" | "gov" | "관급" | "관급매출" => Ok(Category::Government),
            "private" | "priv" | "사급" | "사급매출" => Ok(Category::Private),
            other => Err(format!("unknown sales category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesEntry {
    pub kind: EntryKind,
    pub date: NaiveDate,
    pub contract_name: String,
    pub customer: String,
    pub amount: i64,
    pub item: String,
    pub spec: String,
    pub quantity: i64,
    pub unit_price: i64,
}

impl SalesEntry {
    /// Identity used for distinct counts and detail merging.
    pub fn contract_key(&self) -> String {
        format!("{}-{}", self.contract_name, self.customer)
    }

    pub fn period(&self) -> YearMonth {
        YearMonth {
            year: self.date.year(),
            month: self.date.month(),
        }
    }
}

/// Entries produced by one sheet row; empty when the row is unusable.
pub fn expand_row(row: &RawRow) -> Vec<SalesEntry> {
    let text = |key: &str| row.get(key).unwrap_or_default().trim().to_string();

    let Some(date) = row.first_of(&columns::DATE).and_then(parse_date_loose) else {
        return Vec::new();
    };
    let amount = parse_amount(row.get(columns::AMOUNT).unwrap_or_default());
    let contract_name = text(columns::CONTRACT);
    let customer = text(columns::CUSTOMER);
    if amount == 0 || contract_name.is_empty() || customer.is_empty() {
        return Vec::new();
    }

    let invoice = row.get(columns::INVOICE).and_then(parse_date_loose);
    let base = SalesEntry {
        kind: if invoice.is_some() { EntryKind::Delivered } else { EntryKind::Order },
        date,
        contract_name,
        customer,
        amount,
        item: text(columns::ITEM),
        spec: text(columns::SPEC),
        quantity: parse_amount(row.get(columns::QUANTITY).unwrap_or_default()),
        unit_price: parse_amount(row.get(columns::UNIT_PRICE).unwrap_or_default()),
    };

    let mut out = vec![base.clone()];
    if let Some(invoice) = invoice {
        let kind = row.get(columns::KIND).unwrap_or_default();
        let revenue = if kind.contains("관급") {
            Some(EntryKind::Government)
        } else if kind.contains("사급") {
            Some(EntryKind::Private)
        } else {
            None
        };
        if let Some(kind) = revenue {
            out.push(SalesEntry {
                kind,
                date: invoice,
                ..base
            });
        }
    }
    out
}

pub fn normalize_sales(rows: &[RawRow]) -> Vec<SalesEntry> {
    let entries: Vec<SalesEntry> = rows.iter().flat_map(expand_row).collect();
    info!(rows = rows.len(), entries = entries.len(), "expanded monthly sales rows");
    entries
}

/// Calendar month, displayed, parsed and serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year = y.parse().map_err(|_| format!("bad year in '{s}'"))?;
        let month = m.parse().map_err(|_| format!("bad month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryBucket {
    pub keys: HashSet<String>,
    pub amount: i64,
    pub entries: Vec<SalesEntry>,
}

impl CategoryBucket {
    fn add(&mut self, e: &SalesEntry) {
        self.keys.insert(e.contract_key());
        self.amount = self.amount.saturating_add(e.amount);
        self.entries.push(e.clone());
    }

    pub fn count(&self) -> usize {
        self.keys.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthBuckets {
    pub order: CategoryBucket,
    pub government: CategoryBucket,
    pub private: CategoryBucket,
}

impl MonthBuckets {
    pub fn get(&self, category: Category) -> &CategoryBucket {
        match category {
            Category::Order => &self.order,
            Category::Government => &self.government,
            Category::Private => &self.private,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut CategoryBucket {
        match category {
            Category::Order => &mut self.order,
            Category::Government => &mut self.government,
            Category::Private => &mut self.private,
        }
    }

    /// Revenue of the month; orders are not revenue.
    pub fn total(&self) -> i64 {
        self.government.amount.saturating_add(self.private.amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesTotals {
    pub order_count: usize,
    pub order_amount: i64,
    pub government_count: usize,
    pub government_amount: i64,
    pub private_count: usize,
    pub private_amount: i64,
    pub grand_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub months: BTreeMap<YearMonth, MonthBuckets>,
    pub totals: SalesTotals,
}

/// Bucket `entries` into every month of `start..=end`.
pub fn monthly_summary(
    entries: &[SalesEntry],
    start: YearMonth,
    end: YearMonth,
) -> Result<MonthlySummary, ReportError> {
    if start > end {
        return Err(ReportError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let mut months: BTreeMap<YearMonth, MonthBuckets> = BTreeMap::new();
    let mut cur = start;
    while cur <= end {
        months.insert(cur, MonthBuckets::default());
        cur = cur.succ();
    }

    for e in entries {
        if let Some(bucket) = months.get_mut(&e.period()) {
            bucket.get_mut(e.kind.category()).add(e);
        }
    }

    let union = |cat: Category| -> usize {
        months
            .values()
            .flat_map(|m| m.get(cat).keys.iter())
            .collect::<HashSet<_>>()
            .len()
    };
    let sum = |cat: Category| -> i64 { saturating_sum(months.values().map(|m| m.get(cat).amount)) };

    let totals = SalesTotals {
        order_count: union(Category::Order),
        order_amount: sum(Category::Order),
        government_count: union(Category::Government),
        government_amount: sum(Category::Government),
        private_count: union(Category::Private),
        private_amount: sum(Category::Private),
        grand_total: sum(Category::Government).saturating_add(sum(Category::Private)),
    };
    Ok(MonthlySummary { months, totals })
}

/// One line of the monthly table.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct MonthlySalesRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "기간")]
    pub period: String,
    #[serde(rename = "OrderCount")]
    #[tabled(rename = "주문 건수", display_with = "format_count")]
    pub order_count: usize,
    #[serde(rename = "OrderAmount")]
    #[tabled(rename = "주문 금액", display_with = "format_currency")]
    pub order_amount: i64,
    #[serde(rename = "GovernmentCount")]
    #[tabled(rename = "관급 건수", display_with = "format_count")]
    pub government_count: usize,
    #[serde(rename = "GovernmentAmount")]
    #[tabled(rename = "관급 매출", display_with = "format_currency")]
    pub government_amount: i64,
    #[serde(rename = "PrivateCount")]
    #[tabled(rename = "사급 건수", display_with = "format_count")]
    pub private_count: usize,
    #[serde(rename = "PrivateAmount")]
    #[tabled(rename = "사급 매출", display_with = "format_currency")]
    pub private_amount: i64,
    #[serde(rename = "Total")]
    #[tabled(rename = "매출 합계", display_with = "format_currency")]
    pub total: i64,
}

impl MonthlySummary {
    /// Table rows, oldest month first, followed by the totals line.
    pub fn rows(&self) -> Vec<MonthlySalesRow> {
        let mut rows: Vec<MonthlySalesRow> = self
            .months
            .iter()
            .map(|(period, m)| MonthlySalesRow {
                period: format!("{}년 {}월", period.year, period.month),
                order_count: m.order.count(),
                order_amount: m.order.amount,
                government_count: m.government.count(),
                government_amount: m.government.amount,
                private_count: m.private.count(),
                private_amount: m.private.amount,
                total: m.total(),
            })
            .collect();
        let t = &self.totals;
        rows.push(MonthlySalesRow {
            period: "합계".to_string(),
            order_count: t.order_count,
            order_amount: t.order_amount,
            government_count: t.government_count,
            government_amount: t.government_amount,
            private_count: t.private_count,
            private_amount: t.private_amount,
            total: t.grand_total,
        });
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailScope {
    Month(YearMonth),
    WholeRange,
}

/// Sub-row of a merged detail line.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct SalesItemRow {
    #[serde(rename = "Item")]
    #[tabled(rename = "품목")]
    pub item: String,
    #[serde(rename = "Spec")]
    #[tabled(rename = "규격")]
    pub spec: String,
    #[serde(rename = "Quantity")]
    #[tabled(rename = "수량", display_with = "quantity")]
    pub quantity: i64,
    #[serde(rename = "UnitPrice")]
    #[tabled(rename = "단가", display_with = "format_currency")]
    pub unit_price: i64,
    #[serde(rename = "Amount")]
    #[tabled(rename = "금액", display_with = "format_currency")]
    pub amount: i64,
}

fn quantity(n: &i64) -> String {
    crate::util::format_int(*n)
}

/// Entries of one contract-customer pair within a detail view.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct SalesDetailRow {
    #[serde(rename = "Status")]
    #[tabled(rename = "상태")]
    pub status: String,
    #[serde(rename = "ContractName")]
    #[tabled(rename = "계약명")]
    pub contract_name: String,
    #[serde(rename = "Customer")]
    #[tabled(rename = "거래처")]
    pub customer: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "금액", display_with = "format_currency")]
    pub total_amount: i64,
    #[serde(rename = "Date")]
    #[tabled(rename = "날짜")]
    pub date: String,
    #[serde(rename = "Items")]
    #[tabled(skip)]
    pub items: Vec<SalesItemRow>,
}

impl TableRow for SalesDetailRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("type", "상태", SortKind::String, Align::Center),
            Column::new("contractName", "계약명", SortKind::String, Align::Left),
            Column::new("customer", "거래처", SortKind::String, Align::Left),
            Column::new("amount", "금액", SortKind::Numeric, Align::Right),
            Column::new("date", "날짜", SortKind::String, Align::Center),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "type" => SortValue::from(&self.status),
            "contractName" => SortValue::from(&self.contract_name),
            "customer" => SortValue::from(&self.customer),
            "amount" => SortValue::from(self.total_amount),
            "date" => SortValue::from(&self.date),
            _ => SortValue::Missing,
        }
    }
}

/// Merged detail lines for one category, either of a single month or of
/// the whole summarized range. The first entry of each pair supplies the
/// status and date; item sub-rows are listed by amount, largest first.
pub fn sales_detail(
    summary: &MonthlySummary,
    scope: DetailScope,
    category: Category,
    sort: &SortState,
) -> Vec<SalesDetailRow> {
    let entries: Vec<&SalesEntry> = match scope {
        DetailScope::Month(p) => summary
            .months
            .get(&p)
            .map(|m| m.get(category).entries.iter().collect())
            .unwrap_or_default(),
        DetailScope::WholeRange => summary
            .months
            .values()
            .flat_map(|m| m.get(category).entries.iter())
            .collect(),
    };

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<SalesDetailRow> = Vec::new();
    for e in entries {
        let key = e.contract_key();
        let slot = match index.get(&key) {
            Some(&i) => {
                rows[i].total_amount = rows[i].total_amount.saturating_add(e.amount);
                i
            }
            None => {
                index.insert(key, rows.len());
                rows.push(SalesDetailRow {
                    status: e.kind.label().to_string(),
                    contract_name: e.contract_name.clone(),
                    customer: e.customer.clone(),
                    total_amount: e.amount,
                    date: e.date.format("%Y-%m-%d").to_string(),
                    items: Vec::new(),
                });
                rows.len() - 1
            }
        };
        if !e.item.is_empty() {
            rows[slot].items.push(SalesItemRow {
                item: e.item.clone(),
                spec: e.spec.clone(),
                quantity: e.quantity,
                unit_price: e.unit_price,
                amount: e.amount,
            });
        }
    }

    for row in &mut rows {
        row.items.sort_by(|a, b| b.amount.cmp(&a.amount));
    }
    sort_rows(&mut rows, sort);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn row(date: &str, invoice: &str, kind: &str, contract: &str, customer: &str, amount: &str) -> RawRow {
        raw(&[
            ("날짜", date),
            ("세금계산서", invoice),
            ("구분", kind),
            ("계약명", contract),
            ("거래처", customer),
            ("합계", amount),
            ("품목구분", "보행매트"),
            ("규격", "1.5m"),
            ("수량", "10"),
            ("단가", "1,000"),
        ])
    }

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn uninvoiced_row_is_an_order() {
        let entries = expand_row(&row("2025-01-10", "", "관급", "A공사", "수원시", "10,000"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Order);
        assert_eq!(entries[0].unit_price, 1000);
    }

    #[test]
    fn invoiced_row_adds_revenue_at_invoice_date() {
        let entries = expand_row(&row("2025-01-10", "2025. 2. 3", "관급(조달)", "A공사", "수원시", "10000"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Delivered);
        assert_eq!(entries[0].period(), ym("2025-01"));
        assert_eq!(entries[1].kind, EntryKind::Government);
        assert_eq!(entries[1].period(), ym("2025-02"));

        let private = expand_row(&row("1/10/2025", "2025-01-20", "사급", "B", "C", "1"));
        assert_eq!(private[1].kind, EntryKind::Private);

        let neither = expand_row(&row("2025-01-10", "2025-01-20", "기타", "B", "C", "1"));
        assert_eq!(neither.len(), 1);
    }

    #[test]
    fn unusable_rows_are_dropped() {
        assert!(expand_row(&row("언젠가", "", "관급", "A", "B", "100")).is_empty());
        assert!(expand_row(&row("2025-01-10", "", "관급", "A", "B", "0")).is_empty());
        assert!(expand_row(&row("2025-01-10", "", "관급", "", "B", "100")).is_empty());
        assert!(expand_row(&row("2025-01-10", "", "관급", "A", " ", "100")).is_empty());
    }

    #[test]
    fn falls_back_to_order_date_column() {
        let r = raw(&[("주문일자", "2025-03-01"), ("계약명", "A"), ("거래처", "B"), ("합계", "5")]);
        assert_eq!(expand_row(&r)[0].period(), ym("2025-03"));
    }

    #[test]
    fn inverted_range_is_an_error() {
        let err = monthly_summary(&[], ym("2025-03"), ym("2025-01")).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRange { .. }));
    }

    #[test]
    fn summary_counts_distinct_keys_and_unions_totals() {
        let rows = vec![
            row("2024-12-20", "2025-01-05", "관급", "A공사", "수원시", "100"),
            row("2025-01-10", "2025-02-03", "관급", "A공사", "수원시", "200"),
            row("2025-01-11", "", "사급", "B공사", "성남시", "50"),
            row("2025-02-01", "2025-02-10", "사급", "B공사", "성남시", "70"),
        ];
        let entries = normalize_sales(&rows);
        let s = monthly_summary(&entries, ym("2025-01"), ym("2025-02")).unwrap();
        assert_eq!(s.months.len(), 2);

        let jan = &s.months[&ym("2025-01")];
        assert_eq!(jan.order.count(), 2);
        assert_eq!(jan.order.amount, 250);
        assert_eq!(jan.government.amount, 100);

        let feb = &s.months[&ym("2025-02")];
        assert_eq!(feb.government.amount, 200);
        assert_eq!(feb.private.amount, 70);

        assert_eq!(s.totals.government_count, 1);
        assert_eq!(s.totals.government_amount, 300);
        assert_eq!(s.totals.order_count, 2);
        assert_eq!(s.totals.grand_total, 370);

        let table = s.rows();
        assert_eq!(table.len(), 3);
        assert_eq!(table[2].period, "합계");
        assert_eq!(table[1].total, 270);
    }

    #[test]
    fn detail_merges_pairs_and_sorts() {
        let rows = vec![
            row("2025-01-10", "", "관급", "A공사", "수원시", "100"),
            row("2025-01-12", "", "관급", "A공사", "수원시", "300"),
            row("2025-01-20", "", "관급", "B공사", "성남시", "50"),
        ];
        let s = monthly_summary(&normalize_sales(&rows), ym("2025-01"), ym("2025-01")).unwrap();
        let detail = sales_detail(
            &s,
            DetailScope::WholeRange,
            Category::Order,
            &SortState::descending("date", SortKind::String),
        );
        assert_eq!(detail.len(), 2);
        assert_eq!(detail[0].contract_name, "B공사");
        assert_eq!(detail[1].total_amount, 400);
        assert_eq!(detail[1].date, "2025-01-10");
        assert_eq!(detail[1].items.iter().map(|i| i.amount).collect::<Vec<_>>(), vec![300, 100]);

        let none = sales_detail(&s, DetailScope::Month(ym("2024-12")), Category::Order, &SortState::descending("date", SortKind::String));
        assert!(none.is_empty());
    }

    #[test]
    fn periods_parse_and_step() {
        assert_eq!(ym("2024-12").succ(), ym("2025-01"));
        assert_eq!(ym("2025-03").to_string(), "2025-03");
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("2025".parse::<YearMonth>().is_err());
        assert_eq!("관급".parse::<Category>(), Ok(Category::Government));
    }
}
