// Grouping and derived metrics shared by the report views.
//
// Grouping is a single pass that keeps first-seen order; nothing here sorts.
// Presentation order is the sort module's job.
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::TransactionRecord;
use crate::util::{pct_change, saturating_sum};

/// Length of the trailing window used for "vs. average" comparisons.
pub const TRAILING_YEARS: i32 = 5;

/// Grouping dimension of a procurement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Agency,
    Supplier,
    Region,
    AgencyType,
}

impl Dimension {
    pub fn key(self, r: &TransactionRecord) -> &str {
        match self {
            Dimension::Agency => &r.agency,
            Dimension::Supplier => &r.supplier,
            Dimension::Region => &r.region,
            Dimension::AgencyType => &r.agency_type,
        }
    }

    /// The party on the other side of the transaction: suppliers for an
    /// agency group, agencies for everything else.
    pub fn counterparty(self, r: &TransactionRecord) -> &str {
        match self {
            Dimension::Agency => &r.supplier,
            _ => &r.agency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedGroup {
    pub key: String,
    pub total_amount: i64,
    /// Number of records folded into the group.
    pub record_count: usize,
    pub contracts: HashSet<String>,
    pub counterparties: HashSet<String>,
    // carried over from the first record seen
    pub region: String,
    pub city: String,
    pub full_region: String,
    pub agency_type: String,
}

impl AggregatedGroup {
    fn start(key: String, first: &TransactionRecord) -> Self {
        Self {
            key,
            total_amount: 0,
            record_count: 0,
            contracts: HashSet::new(),
            counterparties: HashSet::new(),
            region: first.region.clone(),
            city: first.city.clone(),
            full_region: first.full_region.clone(),
            agency_type: first.agency_type.clone(),
        }
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn counterparty_count(&self) -> usize {
        self.counterparties.len()
    }

    /// `"<region> <city>"`, or just the region when the city is unknown.
    pub fn region_label(&self) -> String {
        if self.city.is_empty() {
            self.region.clone()
        } else {
            format!("{} {}", self.region, self.city)
        }
    }
}

/// Group `records` by `key`, tracking distinct contract names and distinct
/// `counterparty` values per group. Groups come out in first-seen order.
pub fn group_records<K, C>(records: &[TransactionRecord], key: K, counterparty: C) -> Vec<AggregatedGroup>
where
    K: Fn(&TransactionRecord) -> String,
    C: Fn(&TransactionRecord) -> &str,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<AggregatedGroup> = Vec::new();

    for r in records {
        let k = key(r);
        let slot = match index.get(&k) {
            Some(&i) => i,
            None => {
                index.insert(k.clone(), groups.len());
                groups.push(AggregatedGroup::start(k, r));
                groups.len() - 1
            }
        };
        let g = &mut groups[slot];
        g.total_amount = g.total_amount.saturating_add(r.amount);
        g.record_count += 1;
        g.contracts.insert(r.contract_name.clone());
        g.counterparties.insert(counterparty(r).to_string());
    }

    groups
}

pub fn group_by(records: &[TransactionRecord], dim: Dimension) -> Vec<AggregatedGroup> {
    group_records(records, |r| dim.key(r).to_string(), |r| dim.counterparty(r))
}

pub fn total_amount(records: &[TransactionRecord]) -> i64 {
    saturating_sum(records.iter().map(|r| r.amount))
}

/// Percentage of `total`; 0 when the total is 0.
pub fn share(amount: i64, total: i64) -> f64 {
    if total > 0 {
        amount as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Shares of each group against the sum of all groups.
pub fn shares(groups: &[AggregatedGroup]) -> Vec<f64> {
    let total = saturating_sum(groups.iter().map(|g| g.total_amount));
    groups.iter().map(|g| share(g.total_amount, total)).collect()
}

/// The `TRAILING_YEARS` calendar years ending at `anchor`, oldest first.
pub fn trailing_years(anchor: i32) -> Vec<i32> {
    (anchor - TRAILING_YEARS + 1..=anchor).collect()
}

/// Mean of the non-zero amounts; years without activity do not count
/// toward the denominator. 0 when every amount is 0.
pub fn nonzero_average(amounts: &[i64]) -> f64 {
    let active: Vec<i64> = amounts.iter().copied().filter(|a| *a > 0).collect();
    if active.is_empty() {
        return 0.0;
    }
    saturating_sum(active.iter().copied()) as f64 / active.len() as f64
}

/// Amount and distinct contracts of one calendar year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearBucket {
    pub amount: i64,
    pub contracts: HashSet<String>,
}

/// Per-year buckets for `years` (all present, possibly empty).
pub fn yearly_buckets<'a>(
    records: impl IntoIterator<Item = &'a TransactionRecord>,
    years: &[i32],
) -> BTreeMap<i32, YearBucket> {
    let mut out: BTreeMap<i32, YearBucket> =
        years.iter().map(|y| (*y, YearBucket::default())).collect();
    for r in records {
        if r.date.is_empty() {
            continue;
        }
        let Some(year) = r.year() else { continue };
        if let Some(b) = out.get_mut(&year) {
            b.amount = b.amount.saturating_add(r.amount);
            b.contracts.insert(r.contract_name.clone());
        }
    }
    out
}

/// A selected year's amount against the trailing non-zero average.
#[derive(Debug, Clone, PartialEq)]
pub struct VsAverage {
    pub years: Vec<i32>,
    pub amounts: Vec<i64>,
    pub average: f64,
    pub selected_year: i32,
    pub selected_amount: i64,
    /// `(selected / average - 1) * 100`, 0 without history.
    pub ratio: f64,
}

/// Compare `selected_year` against the trailing window ending at `window_end`.
/// The selected year may lie outside the window, in which case its amount is 0.
pub fn vs_average(by_year: &BTreeMap<i32, i64>, window_end: i32, selected_year: i32) -> VsAverage {
    let years = trailing_years(window_end);
    let amounts: Vec<i64> = years
        .iter()
        .map(|y| by_year.get(y).copied().unwrap_or(0))
        .collect();
    let average = nonzero_average(&amounts);
    let selected_amount = years
        .iter()
        .position(|y| *y == selected_year)
        .map(|i| amounts[i])
        .unwrap_or(0);
    VsAverage {
        ratio: pct_change(selected_amount as f64, average),
        years,
        amounts,
        average,
        selected_year,
        selected_amount,
    }
}

/// Yearly totals per entity, built in one pass over the full record set so
/// every group in a ranking can look its history up.
#[derive(Debug, Clone, Default)]
pub struct YearlyIndex {
    totals: HashMap<String, BTreeMap<i32, i64>>,
}

impl YearlyIndex {
    pub fn build(records: &[TransactionRecord], dim: Dimension) -> Self {
        let mut totals: HashMap<String, BTreeMap<i32, i64>> = HashMap::new();
        for r in records {
            if r.date.is_empty() {
                continue;
            }
            let Some(year) = r.year() else { continue };
            let total = totals
                .entry(dim.key(r).to_string())
                .or_default()
                .entry(year)
                .or_insert(0);
            *total = total.saturating_add(r.amount);
        }
        Self { totals }
    }

    pub fn years_of(&self, key: &str) -> BTreeMap<i32, i64> {
        self.totals.get(key).cloned().unwrap_or_default()
    }

    /// Ratio of `year` against the trailing window ending at `year`.
    pub fn vs_average(&self, key: &str, year: i32) -> f64 {
        match self.totals.get(key) {
            Some(by_year) => vs_average(by_year, year, year).ratio,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(agency: &str, supplier: &str, amount: i64, contract: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            agency: agency.into(),
            supplier: supplier.into(),
            full_region: "경기도 수원시".into(),
            region: "경기도".into(),
            city: "수원시".into(),
            agency_type: "기타".into(),
            product: "보행매트".into(),
            amount,
            date: date.into(),
            contract_name: contract.into(),
        }
    }

    #[test]
    fn sums_and_distinct_contracts() {
        let recs = vec![
            rec("A", "S1", 100, "c1", "2024-01-01"),
            rec("A", "S2", 50, "c1", "2024-01-02"),
            rec("A", "S1", 30, "c2", "2024-01-03"),
        ];
        let groups = group_by(&recs, Dimension::Agency);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].total_amount, 180);
        assert_eq!(groups[0].contract_count(), 2);
        assert_eq!(groups[0].counterparty_count(), 2);
        assert_eq!(groups[0].record_count, 3);
    }

    #[test]
    fn saturated_amounts_do_not_overflow_totals() {
        let huge = crate::util::parse_amount("99999999999999999999");
        let recs = vec![rec("A", "S1", huge, "c1", "2024-01-01"), rec("A", "S2", 100, "c2", "2024-02-01")];
        let groups = group_by(&recs, Dimension::Agency);
        assert_eq!(groups[0].total_amount, i64::MAX);
        assert_eq!(total_amount(&recs), i64::MAX);
        let index = YearlyIndex::build(&recs, Dimension::Agency);
        assert_eq!(index.years_of("A").get(&2024), Some(&i64::MAX));
    }

    #[test]
    fn groups_keep_first_seen_order_and_attributes() {
        let mut second = rec("B", "S1", 5, "c3", "");
        second.region = "서울특별시".into();
        second.city = String::new();
        let recs = vec![second, rec("A", "S1", 1, "c1", ""), rec("B", "S2", 5, "c4", "")];
        let groups = group_by(&recs, Dimension::Agency);
        let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, ["B", "A"]);
        assert_eq!(groups[0].region_label(), "서울특별시");
        assert_eq!(groups[1].region_label(), "경기도 수원시");
    }

    #[test]
    fn shares_sum_to_hundred() {
        let recs = vec![
            rec("A", "S1", 333, "c1", ""),
            rec("B", "S1", 333, "c2", ""),
            rec("C", "S1", 334, "c3", ""),
            rec("D", "S1", 7, "c4", ""),
        ];
        let groups = group_by(&recs, Dimension::Agency);
        let total: f64 = shares(&groups).iter().sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(share(10, 0), 0.0);
    }

    #[test]
    fn average_skips_idle_years() {
        assert_eq!(nonzero_average(&[0, 100, 0, 300, 0]), 200.0);
        assert_eq!(nonzero_average(&[0, 0]), 0.0);
    }

    #[test]
    fn vs_average_is_zero_without_history() {
        let v = vs_average(&BTreeMap::new(), 2024, 2024);
        assert_eq!(v.ratio, 0.0);
        assert!(v.ratio.is_finite());
        assert_eq!(v.years, vec![2020, 2021, 2022, 2023, 2024]);
    }

    #[test]
    fn vs_average_against_sparse_history() {
        let by_year = BTreeMap::from([(2021, 100), (2023, 300), (2024, 300)]);
        let v = vs_average(&by_year, 2024, 2024);
        // (100 + 300 + 300) / 3
        assert!((v.average - 233.333_333).abs() < 1e-3);
        assert!((v.ratio - 28.571_428).abs() < 1e-3);
    }

    #[test]
    fn yearly_index_looks_up_per_entity() {
        let recs = vec![
            rec("A", "S", 100, "c1", "2023-03-01"),
            rec("A", "S", 300, "c2", "2024-03-01"),
            rec("A", "S", 999, "c3", ""),
            rec("B", "S", 50, "c4", "2024-03-01"),
        ];
        let idx = YearlyIndex::build(&recs, Dimension::Agency);
        assert!((idx.vs_average("A", 2024) - 50.0).abs() < 1e-9);
        assert_eq!(idx.vs_average("B", 2024), 0.0);
        assert_eq!(idx.vs_average("Z", 2024), 0.0);
    }

    #[test]
    fn yearly_buckets_fill_every_year() {
        let recs = vec![rec("A", "S", 100, "c1", "2023-03-01"), rec("A", "S", 20, "c1", "2023-04-01")];
        let buckets = yearly_buckets(&recs, &trailing_years(2024));
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[&2023].amount, 120);
        assert_eq!(buckets[&2023].contracts.len(), 1);
        assert_eq!(buckets[&2024].amount, 0);
    }
}
