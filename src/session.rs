// Explicit view session. Holds everything a view depends on; every view is
// computed from it on demand and nothing is cached between calls.
use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::aggregate::Dimension;
use crate::error::ReportError;
use crate::filter::{cities_of, FilterOptions, RecordFilter};
use crate::reports::{self, AgencyDetail};
use crate::sort::{SortKind, SortState};
use crate::trends::{compare_trends, BaseYear, TrendComparison};
use crate::types::{
    AgencyRankRow, ContractRow, CustomerRow, SegmentRow, SummaryStats, SupplierAgencyRow,
    SupplierRankRow, TransactionRecord,
};
use crate::util::default_analysis_year;

/// Seller whose customers the customer analysis looks at.
pub const DEFAULT_OWN_SUPPLIER: &str = "두발로 주식회사";

/// Every sortable table the views produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    AgencyRank,
    AgencySuppliers,
    AgencyContracts,
    Suppliers,
    SupplierDetail,
    Customers,
    CustomerRegions,
    CustomerTypes,
    CustomerDetail,
    SalesDetail,
}

impl TableId {
    /// Sort state a table starts with: contract listings newest first,
    /// everything else by amount, largest first.
    pub fn default_sort(self) -> SortState {
        match self {
            TableId::AgencyContracts | TableId::CustomerDetail | TableId::SalesDetail => {
                SortState::descending("date", SortKind::String)
            }
            _ => SortState::descending("amount", SortKind::Numeric),
        }
    }
}

/// One sort state per table, created lazily from the table's default.
#[derive(Debug, Clone, Default)]
pub struct SortBook {
    states: HashMap<TableId, SortState>,
}

impl SortBook {
    pub fn get(&self, table: TableId) -> SortState {
        self.states
            .get(&table)
            .cloned()
            .unwrap_or_else(|| table.default_sort())
    }

    pub fn click(&mut self, table: TableId, key: &str, kind: SortKind) -> &SortState {
        let state = self.states.entry(table).or_insert_with(|| table.default_sort());
        state.toggle(key, kind);
        state
    }
}

/// The three tables of the customer analysis plus its summary.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerView {
    pub summary: SummaryStats,
    pub customers: Vec<CustomerRow>,
    pub regions: Vec<SegmentRow>,
    pub agency_types: Vec<SegmentRow>,
}

pub struct Session {
    records: Vec<TransactionRecord>,
    pub filter: RecordFilter,
    pub sorts: SortBook,
    reference: NaiveDate,
    detail_agency: Option<String>,
    own_supplier: String,
}

impl Session {
    /// New session over the full record set. `reference` stands in for
    /// "today" in every default.
    pub fn new(records: Vec<TransactionRecord>, reference: NaiveDate) -> Self {
        Self {
            records,
            filter: RecordFilter::default(),
            sorts: SortBook::default(),
            reference,
            detail_agency: None,
            own_supplier: DEFAULT_OWN_SUPPLIER.to_string(),
        }
    }

    pub fn with_own_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.own_supplier = supplier.into();
        self
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn own_supplier(&self) -> &str {
        &self.own_supplier
    }

    /// Preselect the default analysis year.
    pub fn select_default_year(&mut self) {
        self.filter.year = Some(default_analysis_year(self.reference));
    }

    /// The filter's year, or the reference year when "all" is selected.
    pub fn selected_year(&self) -> i32 {
        self.filter.year.unwrap_or_else(|| self.reference.year())
    }

    pub fn filtered(&self) -> Vec<TransactionRecord> {
        self.filter.apply(&self.records)
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_records(&self.records)
    }

    pub fn cities(&self, region: &str) -> Vec<String> {
        cities_of(&self.records, region)
    }

    /// Column click on `table`, following the toggle rule.
    pub fn click_sort(&mut self, table: TableId, key: &str, kind: SortKind) -> SortState {
        self.sorts.click(table, key, kind).clone()
    }

    pub fn agency_ranking(&self) -> Vec<AgencyRankRow> {
        reports::agency_ranking(
            &self.filtered(),
            &self.records,
            self.selected_year(),
            &self.sorts.get(TableId::AgencyRank),
        )
    }

    pub fn open_agency(&mut self, agency: impl Into<String>) {
        self.detail_agency = Some(agency.into());
    }

    pub fn close_detail(&mut self) {
        self.detail_agency = None;
    }

    pub fn detail_agency(&self) -> Option<&str> {
        self.detail_agency.as_deref()
    }

    /// Detail of the open agency; None when no agency is open.
    pub fn agency_detail(&self) -> Option<AgencyDetail> {
        let agency = self.detail_agency.as_deref()?;
        Some(reports::agency_detail(
            &self.filtered(),
            &self.records,
            agency,
            self.reference.year(),
            self.selected_year(),
            &self.sorts.get(TableId::AgencySuppliers),
            &self.sorts.get(TableId::AgencyContracts),
        ))
    }

    pub fn supplier_summary(&self) -> SummaryStats {
        reports::supplier_summary(&self.filtered())
    }

    pub fn supplier_ranking(&self) -> Vec<SupplierRankRow> {
        reports::supplier_ranking(&self.filtered(), &self.sorts.get(TableId::Suppliers))
    }

    pub fn supplier_detail(&self, supplier: &str) -> Vec<SupplierAgencyRow> {
        reports::supplier_detail(&self.filtered(), supplier, &self.sorts.get(TableId::SupplierDetail))
    }

    fn own_filtered(&self) -> Vec<TransactionRecord> {
        self.filter.apply(&reports::own_sales(&self.records, &self.own_supplier))
    }

    pub fn customer_view(&self) -> CustomerView {
        let records = self.own_filtered();
        CustomerView {
            summary: reports::customer_summary(&records),
            customers: reports::customer_table(&records, &self.sorts.get(TableId::Customers)),
            regions: reports::segment_table(&records, Dimension::Region, &self.sorts.get(TableId::CustomerRegions)),
            agency_types: reports::segment_table(
                &records,
                Dimension::AgencyType,
                &self.sorts.get(TableId::CustomerTypes),
            ),
        }
    }

    pub fn customer_detail(&self, customer: &str) -> Vec<ContractRow> {
        reports::customer_detail(&self.own_filtered(), customer, &self.sorts.get(TableId::CustomerDetail))
    }

    /// Trend comparison over all records; only the product of the current
    /// filter applies.
    pub fn trends(&self, base: BaseYear, comparison_year: i32) -> Result<TrendComparison, ReportError> {
        compare_trends(&self.records, base, comparison_year, self.filter.product.as_deref())
    }
}
