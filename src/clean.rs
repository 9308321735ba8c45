use serde::Serialize;
use tracing::info;

use crate::types::{RawRow, TransactionRecord};
use crate::util::{parse_amount, split_region};

/// Procurement export column names.
pub mod columns {
    pub const AGENCY: &str = "수요기관명";
    pub const SUPPLIER: &str = "업체";
    pub const REGION: &str = "수요기관지역";
    pub const AGENCY_TYPE: &str = "소관구분";
    pub const PRODUCT: &str = "세부품명";
    pub const AMOUNT: &str = "공급금액";
    pub const DATE: &str = "기준일자";
    pub const CONTRACT: &str = "계약명";
}

/// Category used when an export has no agency type.
pub const OTHER_AGENCY_TYPE: &str = "기타";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub retained_rows: usize,
    pub rejected_rows: usize,
}

/// Map one raw row to a record, or `None` when it fails retention
/// (missing agency, supplier or contract name, or a non-positive amount).
pub fn normalize_row(row: &RawRow) -> Option<TransactionRecord> {
    let text = |key: &str| row.get(key).unwrap_or_default().trim().to_string();

    let agency = text(columns::AGENCY);
    let supplier = text(columns::SUPPLIER);
    let contract_name = text(columns::CONTRACT);
    let amount = parse_amount(row.get(columns::AMOUNT).unwrap_or_default());
    if agency.is_empty() || supplier.is_empty() || contract_name.is_empty() || amount <= 0 {
        return None;
    }

    let full_region = text(columns::REGION);
    let (region, city) = split_region(&full_region);
    let agency_type = match text(columns::AGENCY_TYPE) {
        t if t.is_empty() => OTHER_AGENCY_TYPE.to_string(),
        t => t,
    };

    Some(TransactionRecord {
        agency,
        supplier,
        full_region,
        region,
        city,
        agency_type,
        product: text(columns::PRODUCT),
        amount,
        date: text(columns::DATE),
        contract_name,
    })
}

/// Normalize a raw row stream, dropping rejected rows silently.
pub fn normalize(rows: &[RawRow]) -> (Vec<TransactionRecord>, LoadReport) {
    let records: Vec<TransactionRecord> = rows.iter().filter_map(normalize_row).collect();
    let report = LoadReport {
        total_rows: rows.len(),
        retained_rows: records.len(),
        rejected_rows: rows.len() - records.len(),
    };
    info!(
        total = report.total_rows,
        retained = report.retained_rows,
        rejected = report.rejected_rows,
        "normalized procurement rows"
    );
    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn full_row() -> Vec<(&'static str, &'static str)> {
        vec![
            (columns::AGENCY, " 수원시청 "),
            (columns::SUPPLIER, "두발로 주식회사"),
            (columns::REGION, "경기도 수원시 장안구"),
            (columns::AGENCY_TYPE, "지방자치단체"),
            (columns::PRODUCT, "보행매트"),
            (columns::AMOUNT, "1,250,000"),
            (columns::DATE, "2024-05-02"),
            (columns::CONTRACT, "보행매트 구매"),
        ]
    }

    #[test]
    fn maps_and_trims_fields() {
        let rec = normalize_row(&raw(&full_row())).unwrap();
        assert_eq!(rec.agency, "수원시청");
        assert_eq!(rec.region, "경기도");
        assert_eq!(rec.city, "수원시");
        assert_eq!(rec.full_region, "경기도 수원시 장안구");
        assert_eq!(rec.amount, 1_250_000);
        assert_eq!(rec.date, "2024-05-02");
        assert_eq!(rec.year(), Some(2024));
        assert_eq!(rec.month(), Some(5));
    }

    #[test]
    fn missing_agency_type_defaults_to_other() {
        let mut pairs = full_row();
        pairs.retain(|(k, _)| *k != columns::AGENCY_TYPE);
        let rec = normalize_row(&raw(&pairs)).unwrap();
        assert_eq!(rec.agency_type, OTHER_AGENCY_TYPE);

        let mut pairs = full_row();
        pairs[3].1 = "   ";
        assert_eq!(normalize_row(&raw(&pairs)).unwrap().agency_type, OTHER_AGENCY_TYPE);
    }

    #[test]
    fn missing_region_gives_empty_parts() {
        let mut pairs = full_row();
        pairs.retain(|(k, _)| *k != columns::REGION);
        let rec = normalize_row(&raw(&pairs)).unwrap();
        assert_eq!((rec.region.as_str(), rec.city.as_str()), ("", ""));
    }

    #[test]
    fn retention_rejects_incomplete_rows() {
        for (idx, bad) in [(0, " "), (1, ""), (7, ""), (5, "0"), (5, "없음")] {
            let mut pairs = full_row();
            pairs[idx].1 = bad;
            assert!(normalize_row(&raw(&pairs)).is_none(), "column {idx} = {bad:?}");
        }
    }

    #[test]
    fn report_counts_rejections() {
        let mut bad = full_row();
        bad[5].1 = "";
        let rows = vec![raw(&full_row()), raw(&bad), raw(&full_row())];
        let (records, report) = normalize(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(
            report,
            LoadReport { total_rows: 3, retained_rows: 2, rejected_rows: 1 }
        );
        assert!(records
            .iter()
            .all(|r| !r.agency.is_empty() && !r.supplier.is_empty() && !r.contract_name.is_empty() && r.amount > 0));
    }
}
