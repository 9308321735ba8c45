use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::sort::{Align, Column, SortKind, SortValue, TableRow};
use crate::util::{format_count, format_currency, format_ratio, format_share};

/// One CSV data line keyed by header, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. A repeated header keeps its original position
    /// and takes the later value.
    pub fn insert(&mut self, key: &str, value: String) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty value among `keys`.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.trim().is_empty())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            let k = k.into();
            row.insert(&k, v.into());
        }
        row
    }
}

/// Normalized procurement transaction. Only rows passing the retention rule
/// (agency, supplier, contract name non-empty and amount > 0) exist as
/// values of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub agency: String,
    pub supplier: String,
    pub full_region: String,
    pub region: String,
    pub city: String,
    pub agency_type: String,
    pub product: String,
    pub amount: i64,
    /// `YYYY-MM-DD` as exported; empty when unknown.
    pub date: String,
    pub contract_name: String,
}

impl TransactionRecord {
    /// Calendar year of `date`, if it has one.
    pub fn year(&self) -> Option<i32> {
        crate::util::parse_date_loose(&self.date)
            .map(|d| chrono::Datelike::year(&d))
            .or_else(|| self.date.get(..4).and_then(|y| y.parse().ok()))
    }

    /// 1-based month of `date`, if parseable.
    pub fn month(&self) -> Option<u32> {
        crate::util::parse_date_loose(&self.date).map(|d| chrono::Datelike::month(&d))
    }
}

// ---------------------------------------------------------------------------
// Presentation rows. Each one is a table the console renders and the export
// writes; `TableRow` supplies column definitions and sort keys.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct AgencyRankRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "순위")]
    pub rank: usize,
    #[serde(rename = "Agency")]
    #[tabled(rename = "수요기관명")]
    pub agency: String,
    #[serde(rename = "Region")]
    #[tabled(rename = "지역")]
    pub full_region: String,
    #[serde(rename = "ContractCount")]
    #[tabled(rename = "거래건수", display_with = "format_count")]
    pub contract_count: usize,
    #[serde(rename = "SupplierCount")]
    #[tabled(rename = "거래처 수", display_with = "format_count")]
    pub supplier_count: usize,
    #[serde(rename = "Amount")]
    #[tabled(rename = "총 구매액", display_with = "format_currency")]
    pub amount: i64,
    #[serde(rename = "VsAvg")]
    #[tabled(rename = "평균 대비", display_with = "format_ratio")]
    pub vs_avg: f64,
}

impl TableRow for AgencyRankRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("rank", "순위", SortKind::Numeric, Align::Center),
            Column::new("agency", "수요기관명", SortKind::String, Align::Left),
            Column::new("fullRegion", "지역", SortKind::String, Align::Left),
            Column::new("contractCount", "거래건수", SortKind::Numeric, Align::Center),
            Column::new("supplierCount", "거래처 수", SortKind::Numeric, Align::Center),
            Column::new("amount", "총 구매액", SortKind::Numeric, Align::Right),
            Column::new("vsAvg", "평균 대비", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "rank" => SortValue::from(self.rank),
            "agency" => SortValue::from(&self.agency),
            "fullRegion" => SortValue::from(&self.full_region),
            "contractCount" => SortValue::from(self.contract_count),
            "supplierCount" => SortValue::from(self.supplier_count),
            "amount" => SortValue::from(self.amount),
            "vsAvg" => SortValue::Number(self.vs_avg),
            _ => SortValue::Missing,
        }
    }

    fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

/// Supplier share within one agency's purchases.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SupplierShareRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "순위")]
    pub rank: usize,
    #[serde(rename = "Supplier")]
    #[tabled(rename = "업체명")]
    pub supplier: String,
    #[serde(rename = "ContractCount")]
    #[tabled(rename = "거래건수", display_with = "format_count")]
    pub contract_count: usize,
    #[serde(rename = "Share")]
    #[tabled(rename = "점유율", display_with = "format_share")]
    pub share: f64,
    #[serde(rename = "Amount")]
    #[tabled(rename = "구매금액", display_with = "format_currency")]
    pub amount: i64,
}

impl TableRow for SupplierShareRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("rank", "순위", SortKind::Numeric, Align::Center),
            Column::new("supplier", "업체명", SortKind::String, Align::Left),
            Column::new("contractCount", "거래건수", SortKind::Numeric, Align::Center),
            Column::new("share", "점유율", SortKind::Numeric, Align::Right),
            Column::new("amount", "구매금액", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "rank" => SortValue::from(self.rank),
            "supplier" => SortValue::from(&self.supplier),
            "contractCount" => SortValue::from(self.contract_count),
            "share" => SortValue::Number(self.share),
            "amount" => SortValue::from(self.amount),
            _ => SortValue::Missing,
        }
    }

    fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

/// One contract line; used by agency detail and customer detail.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ContractRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "순번")]
    pub rank: usize,
    #[serde(rename = "Date")]
    #[tabled(rename = "거래일자")]
    pub date: String,
    #[serde(rename = "ContractName")]
    #[tabled(rename = "계약명")]
    pub contract_name: String,
    #[serde(rename = "Counterparty")]
    #[tabled(rename = "거래처")]
    pub counterparty: String,
    #[serde(rename = "Product")]
    #[tabled(rename = "품목")]
    pub product: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "공급금액", display_with = "format_currency")]
    pub amount: i64,
}

impl TableRow for ContractRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("rank", "순번", SortKind::Numeric, Align::Center),
            Column::new("date", "거래일자", SortKind::String, Align::Center),
            Column::new("contractName", "계약명", SortKind::String, Align::Left),
            Column::new("counterparty", "거래처", SortKind::String, Align::Left),
            Column::new("product", "품목", SortKind::String, Align::Left),
            Column::new("amount", "공급금액", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "rank" => SortValue::from(self.rank),
            "date" | "contractDate" => SortValue::from(&self.date),
            "contractName" => SortValue::from(&self.contract_name),
            "counterparty" | "supplier" | "customer" => SortValue::from(&self.counterparty),
            "product" => SortValue::from(&self.product),
            "amount" => SortValue::from(self.amount),
            _ => SortValue::Missing,
        }
    }

    fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SupplierRankRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "순위")]
    pub rank: usize,
    #[serde(rename = "Supplier")]
    #[tabled(rename = "업체명")]
    pub supplier: String,
    #[serde(rename = "ContractCount")]
    #[tabled(rename = "계약건수", display_with = "format_count")]
    pub contract_count: usize,
    #[serde(rename = "Amount")]
    #[tabled(rename = "판매금액", display_with = "format_currency")]
    pub amount: i64,
}

impl TableRow for SupplierRankRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("rank", "순위", SortKind::Numeric, Align::Center),
            Column::new("supplier", "업체명", SortKind::String, Align::Left),
            Column::new("contractCount", "계약건수", SortKind::Numeric, Align::Center),
            Column::new("amount", "판매금액", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "rank" => SortValue::from(self.rank),
            "supplier" => SortValue::from(&self.supplier),
            "contractCount" => SortValue::from(self.contract_count),
            "amount" => SortValue::from(self.amount),
            _ => SortValue::Missing,
        }
    }

    fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

/// One agency's purchases from a given supplier, next to the agency total.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SupplierAgencyRow {
    #[serde(rename = "Agency")]
    #[tabled(rename = "수요기관명")]
    pub agency: String,
    #[serde(rename = "Region")]
    #[tabled(rename = "지역")]
    pub region: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "구매금액", display_with = "format_currency")]
    pub amount: i64,
    #[serde(rename = "AgencyTotal")]
    #[tabled(rename = "기관 총 구매액", display_with = "format_currency")]
    pub total_amount: i64,
}

impl TableRow for SupplierAgencyRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("agency", "수요기관명", SortKind::String, Align::Left),
            Column::new("region", "지역", SortKind::String, Align::Left),
            Column::new("amount", "구매금액", SortKind::Numeric, Align::Right),
            Column::new("totalAmount", "기관 총 구매액", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "agency" => SortValue::from(&self.agency),
            "region" => SortValue::from(&self.region),
            "amount" => SortValue::from(self.amount),
            "totalAmount" => SortValue::from(self.total_amount),
            _ => SortValue::Missing,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CustomerRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "순위")]
    pub rank: usize,
    #[serde(rename = "Customer")]
    #[tabled(rename = "수요기관명")]
    pub customer: String,
    #[serde(rename = "Region")]
    #[tabled(rename = "지역")]
    pub region: String,
    #[serde(rename = "AgencyType")]
    #[tabled(rename = "소관구분")]
    pub agency_type: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "거래건수", display_with = "format_count")]
    pub count: usize,
    #[serde(rename = "Amount")]
    #[tabled(rename = "매출액", display_with = "format_currency")]
    pub amount: i64,
    #[serde(rename = "Share")]
    #[tabled(rename = "점유율", display_with = "format_share")]
    pub share: f64,
}

impl TableRow for CustomerRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("rank", "순위", SortKind::Numeric, Align::Center),
            Column::new("customer", "수요기관명", SortKind::String, Align::Left),
            Column::new("region", "지역", SortKind::String, Align::Left),
            Column::new("agencyType", "소관구분", SortKind::String, Align::Left),
            Column::new("count", "거래건수", SortKind::Numeric, Align::Center),
            Column::new("amount", "매출액", SortKind::Numeric, Align::Right),
            Column::new("share", "점유율", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "rank" => SortValue::from(self.rank),
            "customer" => SortValue::from(&self.customer),
            "region" => SortValue::from(&self.region),
            "agencyType" => SortValue::from(&self.agency_type),
            "count" => SortValue::from(self.count),
            "amount" => SortValue::from(self.amount),
            "share" => SortValue::Number(self.share),
            _ => SortValue::Missing,
        }
    }

    fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

/// Customer rollup by a coarser dimension (region or agency type).
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SegmentRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "순위")]
    pub rank: usize,
    #[serde(rename = "Segment")]
    #[tabled(rename = "구분")]
    pub segment: String,
    #[serde(rename = "CustomerCount")]
    #[tabled(rename = "고객 수", display_with = "format_count")]
    pub customer_count: usize,
    #[serde(rename = "ContractCount")]
    #[tabled(rename = "거래건수", display_with = "format_count")]
    pub contract_count: usize,
    #[serde(rename = "Amount")]
    #[tabled(rename = "매출액", display_with = "format_currency")]
    pub amount: i64,
    #[serde(rename = "Share")]
    #[tabled(rename = "점유율", display_with = "format_share")]
    pub share: f64,
}

impl TableRow for SegmentRow {
    fn columns() -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            Column::new("rank", "순위", SortKind::Numeric, Align::Center),
            Column::new("segment", "구분", SortKind::String, Align::Left),
            Column::new("customerCount", "고객 수", SortKind::Numeric, Align::Center),
            Column::new("contractCount", "거래건수", SortKind::Numeric, Align::Center),
            Column::new("amount", "매출액", SortKind::Numeric, Align::Right),
            Column::new("share", "점유율", SortKind::Numeric, Align::Right),
        ];
        COLUMNS
    }

    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "rank" => SortValue::from(self.rank),
            "segment" | "region" | "agencyType" => SortValue::from(&self.segment),
            "customerCount" => SortValue::from(self.customer_count),
            "contractCount" => SortValue::from(self.contract_count),
            "amount" => SortValue::from(self.amount),
            "share" => SortValue::Number(self.share),
            _ => SortValue::Missing,
        }
    }

    fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryStats {
    pub counterparties: usize,
    pub contracts: usize,
    pub total_amount: i64,
}
