// Procurement report views: agency purchases, supplier ranking and the
// own-company customer analysis. Every function takes already filtered
// records and a sort state and returns rows ready for rendering.
use std::collections::HashSet;

use serde::Serialize;
use tabled::Tabled;

use crate::aggregate::{
    group_by, nonzero_average, share, total_amount, trailing_years, yearly_buckets, Dimension,
    YearlyIndex,
};
use crate::sort::{sort_and_rank, sort_rows, SortState};
use crate::types::{
    AgencyRankRow, ContractRow, CustomerRow, SegmentRow, SummaryStats, SupplierAgencyRow,
    SupplierRankRow, SupplierShareRow, TransactionRecord,
};
use crate::util::{format_count, format_currency, pct_change};

/// Agency ranking. `vs_avg` compares `selected_year` against the agency's
/// trailing history in `all` (the unfiltered record set).
pub fn agency_ranking(
    filtered: &[TransactionRecord],
    all: &[TransactionRecord],
    selected_year: i32,
    sort: &SortState,
) -> Vec<AgencyRankRow> {
    let history = YearlyIndex::build(all, Dimension::Agency);
    let mut rows: Vec<AgencyRankRow> = group_by(filtered, Dimension::Agency)
        .into_iter()
        .map(|g| AgencyRankRow {
            rank: 0,
            full_region: g.region_label(),
            contract_count: g.contract_count(),
            supplier_count: g.counterparty_count(),
            amount: g.total_amount,
            vs_avg: history.vs_average(&g.key, selected_year),
            agency: g.key,
        })
        .collect();
    sort_and_rank(&mut rows, sort);
    rows
}

/// Supplier breakdown of one agency's purchases.
pub fn supplier_shares(agency_records: &[TransactionRecord], sort: &SortState) -> Vec<SupplierShareRow> {
    let total = total_amount(agency_records);
    let mut rows: Vec<SupplierShareRow> = group_by(agency_records, Dimension::Supplier)
        .into_iter()
        .map(|g| SupplierShareRow {
            rank: 0,
            contract_count: g.contract_count(),
            share: share(g.total_amount, total),
            amount: g.total_amount,
            supplier: g.key,
        })
        .collect();
    sort_and_rank(&mut rows, sort);
    rows
}

/// One row per record. `side` picks the group the records belong to; the
/// counterparty column shows the other party.
pub fn contract_rows(records: &[TransactionRecord], side: Dimension, sort: &SortState) -> Vec<ContractRow> {
    let mut rows: Vec<ContractRow> = records
        .iter()
        .map(|r| ContractRow {
            rank: 0,
            date: r.date.clone(),
            contract_name: r.contract_name.clone(),
            counterparty: side.counterparty(r).to_string(),
            product: r.product.clone(),
            amount: r.amount,
        })
        .collect();
    sort_and_rank(&mut rows, sort);
    rows
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct YearTrendRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "연도")]
    pub year: i32,
    #[serde(rename = "ContractCount")]
    #[tabled(rename = "구매건수", display_with = "format_count")]
    pub contract_count: usize,
    #[serde(rename = "Amount")]
    #[tabled(rename = "연간 구매액", display_with = "format_currency")]
    pub amount: i64,
}

/// Five-year purchase history of one agency.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AgencyTrend {
    pub years: Vec<YearTrendRow>,
    /// Mean over years with purchases only.
    pub average: f64,
    pub peak_year: Option<i32>,
    pub peak_amount: i64,
    pub summary_year: i32,
    pub summary_amount: i64,
    pub vs_avg: f64,
}

/// Yearly trend for `agency` over the five years ending at `reference_year`.
/// `summary_year` is the year compared against the average; it may fall
/// outside the window, in which case its amount is 0.
pub fn agency_trend(
    all: &[TransactionRecord],
    agency: &str,
    reference_year: i32,
    summary_year: i32,
) -> AgencyTrend {
    let window = trailing_years(reference_year);
    let buckets = yearly_buckets(all.iter().filter(|r| r.agency == agency), &window);

    let years: Vec<YearTrendRow> = buckets
        .iter()
        .map(|(year, b)| YearTrendRow {
            year: *year,
            contract_count: b.contracts.len(),
            amount: b.amount,
        })
        .collect();
    let amounts: Vec<i64> = years.iter().map(|y| y.amount).collect();
    let average = nonzero_average(&amounts);

    // first year reaching the maximum wins
    let peak_amount = amounts.iter().copied().max().unwrap_or(0);
    let peak_year = if peak_amount > 0 {
        years.iter().find(|y| y.amount == peak_amount).map(|y| y.year)
    } else {
        None
    };

    let summary_amount = buckets.get(&summary_year).map_or(0, |b| b.amount);
    AgencyTrend {
        vs_avg: pct_change(summary_amount as f64, average),
        years,
        average,
        peak_year,
        peak_amount,
        summary_year,
        summary_amount,
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AgencyDetail {
    pub agency: String,
    pub suppliers: Vec<SupplierShareRow>,
    pub contracts: Vec<ContractRow>,
    pub trend: AgencyTrend,
}

/// Drill-down for one agency. Breakdown and contracts come from the
/// filtered records; the trend always looks at the full history.
pub fn agency_detail(
    filtered: &[TransactionRecord],
    all: &[TransactionRecord],
    agency: &str,
    reference_year: i32,
    summary_year: i32,
    supplier_sort: &SortState,
    contract_sort: &SortState,
) -> AgencyDetail {
    let own: Vec<TransactionRecord> = filtered.iter().filter(|r| r.agency == agency).cloned().collect();
    AgencyDetail {
        agency: agency.to_string(),
        suppliers: supplier_shares(&own, supplier_sort),
        contracts: contract_rows(&own, Dimension::Agency, contract_sort),
        trend: agency_trend(all, agency, reference_year, summary_year),
    }
}

/// Distinct suppliers, row count and total sales.
pub fn supplier_summary(records: &[TransactionRecord]) -> SummaryStats {
    SummaryStats {
        counterparties: records.iter().map(|r| r.supplier.as_str()).collect::<HashSet<_>>().len(),
        contracts: records.len(),
        total_amount: total_amount(records),
    }
}

/// Supplier ranking; the contract count here is the number of rows.
pub fn supplier_ranking(records: &[TransactionRecord], sort: &SortState) -> Vec<SupplierRankRow> {
    let mut rows: Vec<SupplierRankRow> = group_by(records, Dimension::Supplier)
        .into_iter()
        .map(|g| SupplierRankRow {
            rank: 0,
            contract_count: g.record_count,
            amount: g.total_amount,
            supplier: g.key,
        })
        .collect();
    sort_and_rank(&mut rows, sort);
    rows
}

/// Agencies that bought from `supplier`, each next to its total purchases
/// across every supplier in `records`.
pub fn supplier_detail(records: &[TransactionRecord], supplier: &str, sort: &SortState) -> Vec<SupplierAgencyRow> {
    let agency_totals = group_by(records, Dimension::Agency);
    let sold: Vec<TransactionRecord> = records.iter().filter(|r| r.supplier == supplier).cloned().collect();
    let mut rows: Vec<SupplierAgencyRow> = group_by(&sold, Dimension::Agency)
        .into_iter()
        .map(|g| SupplierAgencyRow {
            total_amount: agency_totals
                .iter()
                .find(|t| t.key == g.key)
                .map_or(0, |t| t.total_amount),
            region: g.full_region,
            amount: g.total_amount,
            agency: g.key,
        })
        .collect();
    sort_rows(&mut rows, sort);
    rows
}

/// Records sold by `own_supplier`, the base of the customer analysis.
pub fn own_sales(records: &[TransactionRecord], own_supplier: &str) -> Vec<TransactionRecord> {
    records.iter().filter(|r| r.supplier == own_supplier).cloned().collect()
}

/// Distinct customers, row count and total sales.
pub fn customer_summary(records: &[TransactionRecord]) -> SummaryStats {
    SummaryStats {
        counterparties: records.iter().map(|r| r.agency.as_str()).collect::<HashSet<_>>().len(),
        contracts: records.len(),
        total_amount: total_amount(records),
    }
}

pub fn customer_table(records: &[TransactionRecord], sort: &SortState) -> Vec<CustomerRow> {
    let total = total_amount(records);
    let mut rows: Vec<CustomerRow> = group_by(records, Dimension::Agency)
        .into_iter()
        .map(|g| CustomerRow {
            rank: 0,
            region: g.full_region,
            agency_type: g.agency_type,
            count: g.record_count,
            share: share(g.total_amount, total),
            amount: g.total_amount,
            customer: g.key,
        })
        .collect();
    sort_and_rank(&mut rows, sort);
    rows
}

/// Customer rollup by region or agency type.
pub fn segment_table(records: &[TransactionRecord], dim: Dimension, sort: &SortState) -> Vec<SegmentRow> {
    let total = total_amount(records);
    let mut rows: Vec<SegmentRow> = group_by(records, dim)
        .into_iter()
        .map(|g| SegmentRow {
            rank: 0,
            customer_count: g.counterparty_count(),
            contract_count: g.record_count,
            share: share(g.total_amount, total),
            amount: g.total_amount,
            segment: g.key,
        })
        .collect();
    sort_and_rank(&mut rows, sort);
    rows
}

pub fn customer_detail(records: &[TransactionRecord], customer: &str, sort: &SortState) -> Vec<ContractRow> {
    let own: Vec<TransactionRecord> = records.iter().filter(|r| r.agency == customer).cloned().collect();
    contract_rows(&own, Dimension::Agency, sort)
}
