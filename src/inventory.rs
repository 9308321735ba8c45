// Inventory snapshot per product type.
//
// The inventory sheet keeps one column group per product type; which four
// columns to read is resolved once from `COLUMN_SETS`.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::Serialize;
use tabled::Tabled;

use crate::types::RawRow;
use crate::util::{dotted_parts, format_int, parse_leading_int, saturating_sum};

pub const DATE_COLUMN: &str = "일자";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProductType {
    WalkingMat,
    VegetationMat,
    NonSlip,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [ProductType::WalkingMat, ProductType::VegetationMat, ProductType::NonSlip];

    /// Name used in the sheet's column headers.
    pub fn label(self) -> &'static str {
        match self {
            ProductType::WalkingMat => "보행매트",
            ProductType::VegetationMat => "식생매트",
            ProductType::NonSlip => "논슬립",
        }
    }

    pub fn columns(self) -> &'static ColumnSet {
        &COLUMN_SETS[&self]
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductType::ALL
            .into_iter()
            .find(|p| p.label() == s.trim())
            .ok_or_else(|| format!("unknown product type '{}' (보행매트, 식생매트, 논슬립)", s.trim()))
    }
}

/// The four inventory columns of one product type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    pub production_spec: String,
    pub production_qty: String,
    pub shipment_spec: String,
    pub shipment_qty: String,
}

static COLUMN_SETS: Lazy<HashMap<ProductType, ColumnSet>> = Lazy::new(|| {
    ProductType::ALL
        .into_iter()
        .map(|p| {
            let name = p.label();
            let set = ColumnSet {
                production_spec: format!("{name} 생산 규격"),
                production_qty: format!("{name} 생산량"),
                shipment_spec: format!("{name} 출고 규격"),
                shipment_qty: format!("{name} 출고량"),
            };
            (p, set)
        })
        .collect()
});

/// Selected period; `None` means every year or every month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Period {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl Period {
    fn contains(&self, year: i32, month: u32) -> bool {
        self.year.map_or(true, |y| y == year) && self.month.map_or(true, |m| m == month)
    }

    /// Whether a row dated (year, month) counts toward stock at the end of
    /// the period.
    fn reaches(&self, year: i32, month: u32) -> bool {
        match self.year {
            None => true,
            Some(y) if year < y => true,
            Some(y) if year == y => self.month.map_or(true, |m| month <= m),
            Some(_) => false,
        }
    }
}

fn meters(n: &i64) -> String {
    format!("{}m", format_int(*n))
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    #[serde(rename = "Item")]
    #[tabled(rename = "품목(규격)")]
    pub item: String,
    #[serde(rename = "Produced")]
    #[tabled(rename = "생산량", display_with = "meters")]
    pub produced: i64,
    #[serde(rename = "Shipped")]
    #[tabled(rename = "출고량", display_with = "meters")]
    pub shipped: i64,
    #[serde(rename = "Stock")]
    #[tabled(rename = "재고량", display_with = "meters")]
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventorySnapshot {
    pub product: ProductType,
    pub period: Period,
    /// Ordered by item name.
    pub rows: Vec<InventoryRow>,
    pub total_produced: i64,
    pub total_shipped: i64,
    pub total_stock: i64,
}

/// Production and shipments inside `period`, plus running stock through the
/// end of it, for every item of `product`.
pub fn snapshot(rows: &[RawRow], product: ProductType, period: Period) -> InventorySnapshot {
    let cols = product.columns();
    let mut items: BTreeMap<String, InventoryRow> = BTreeMap::new();

    for row in rows {
        let Some((year, month, _)) = row.get(DATE_COLUMN).and_then(dotted_parts) else {
            continue;
        };
        let in_period = period.contains(year, month);
        let counts = period.reaches(year, month);

        let sides = [
            (&cols.production_spec, &cols.production_qty, 1),
            (&cols.shipment_spec, &cols.shipment_qty, -1),
        ];
        for (spec_col, qty_col, sign) in sides {
            let item = row.get(spec_col).unwrap_or_default().trim();
            if item.is_empty() {
                continue;
            }
            let qty = row.get(qty_col).and_then(parse_leading_int).unwrap_or(0);
            let entry = items.entry(item.to_string()).or_insert_with(|| InventoryRow {
                item: item.to_string(),
                produced: 0,
                shipped: 0,
                stock: 0,
            });
            if in_period {
                if sign > 0 {
                    entry.produced = entry.produced.saturating_add(qty);
                } else {
                    entry.shipped = entry.shipped.saturating_add(qty);
                }
            }
            if counts {
                entry.stock = entry.stock.saturating_add(sign * qty);
            }
        }
    }

    let rows: Vec<InventoryRow> = items.into_values().collect();
    InventorySnapshot {
        product,
        period,
        total_produced: saturating_sum(rows.iter().map(|r| r.produced)),
        total_shipped: saturating_sum(rows.iter().map(|r| r.shipped)),
        total_stock: saturating_sum(rows.iter().map(|r| r.stock)),
        rows,
    }
}
