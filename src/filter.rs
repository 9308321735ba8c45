use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::TransactionRecord;

/// Report filter. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub year: Option<i32>,
    pub product: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub agency_type: Option<String>,
    /// Case-insensitive substring of the agency name.
    pub agency_search: Option<String>,
}

impl RecordFilter {
    pub fn year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn matches(&self, r: &TransactionRecord) -> bool {
        let eq = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);
        self.year
            .map_or(true, |y| !r.date.is_empty() && r.date.starts_with(&y.to_string()))
            && eq(&self.product, &r.product)
            && eq(&self.region, &r.region)
            && eq(&self.city, &r.city)
            && eq(&self.agency_type, &r.agency_type)
            && self.agency_search.as_deref().map_or(true, |q| {
                let q = q.trim().to_lowercase();
                q.is_empty() || r.agency.to_lowercase().contains(&q)
            })
    }

    pub fn apply(&self, records: &[TransactionRecord]) -> Vec<TransactionRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Filter choices offered for a record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub products: Vec<String>,
    pub regions: Vec<String>,
    pub agency_types: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        let years: BTreeSet<i32> = records.iter().filter_map(TransactionRecord::year).collect();
        Self {
            // newest first
            years: years.into_iter().rev().collect(),
            products: distinct_sorted(records.iter().map(|r| r.product.as_str())),
            regions: distinct_sorted(records.iter().map(|r| r.region.as_str())),
            agency_types: distinct_sorted(records.iter().map(|r| r.agency_type.as_str())),
        }
    }
}

/// Cities seen under `region`, for the dependent city selector.
pub fn cities_of(records: &[TransactionRecord], region: &str) -> Vec<String> {
    distinct_sorted(
        records
            .iter()
            .filter(|r| r.region == region)
            .map(|r| r.city.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(agency: &str, region: &str, city: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            agency: agency.into(),
            supplier: "S".into(),
            full_region: format!("{region} {city}"),
            region: region.into(),
            city: city.into(),
            agency_type: "지방자치단체".into(),
            product: "보행매트".into(),
            amount: 10,
            date: date.into(),
            contract_name: "c".into(),
        }
    }

    #[test]
    fn default_filter_matches_everything() {
        assert!(RecordFilter::default().matches(&rec("A", "경기도", "", "")));
    }

    #[test]
    fn year_is_a_date_prefix() {
        let f = RecordFilter::year(2024);
        assert!(f.matches(&rec("A", "경기도", "수원시", "2024-01-02")));
        assert!(!f.matches(&rec("A", "경기도", "수원시", "2023-12-31")));
        assert!(!f.matches(&rec("A", "경기도", "수원시", "")));
    }

    #[test]
    fn agency_search_ignores_case_and_blank_queries() {
        let mut f = RecordFilter::default();
        f.agency_search = Some("city".into());
        assert!(f.matches(&rec("Suwon CITY Hall", "경기도", "", "")));
        assert!(!f.matches(&rec("교육청", "경기도", "", "")));
        f.agency_search = Some("   ".into());
        assert!(f.matches(&rec("교육청", "경기도", "", "")));
    }

    #[test]
    fn options_are_distinct_and_sorted() {
        let recs = vec![
            rec("A", "서울특별시", "강남구", "2023-01-01"),
            rec("B", "경기도", "수원시", "2024-01-01"),
            rec("C", "경기도", "성남시", "2024-03-01"),
            rec("D", "경기도", "", "bad"),
        ];
        let opts = FilterOptions::from_records(&recs);
        assert_eq!(opts.years, vec![2024, 2023]);
        assert_eq!(opts.regions, vec!["경기도", "서울특별시"]);
        assert_eq!(cities_of(&recs, "경기도"), vec!["성남시", "수원시"]);
    }
}
