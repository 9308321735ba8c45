// Command line and environment configuration for the report binary.
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::filter::RecordFilter;
use crate::loader::{default_relays, Registry, Relay, INVENTORY};
use crate::session::DEFAULT_OWN_SUPPLIER;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "sales_report", about = "Procurement and sales reports from published spreadsheet exports")]
pub struct Args {
    /// Date treated as "today" for default years and trailing windows (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub reference_date: Option<NaiveDate>,

    /// JSON file of {"dataset": "location"} entries added to the built-in registry
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    /// Per-request timeout; overrides DASHBOARD_TIMEOUT_SECS
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Directory to write every shown table to as CSV
    #[arg(long, global = true)]
    pub export: Option<PathBuf>,

    /// Print the view as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Rows shown per table preview
    #[arg(long, global = true, default_value = "20")]
    pub preview_rows: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Agency purchase ranking
    Agencies {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        sort: SortArgs,
    },
    /// Purchase detail of one agency
    Agency {
        name: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Supplier ranking
    Suppliers {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        sort: SortArgs,
    },
    /// Agencies that bought from one supplier
    Supplier {
        name: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Own-company customers by customer, region and agency type
    Customers {
        /// Show the contracts of this customer instead
        #[arg(long)]
        customer: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        sort: SortArgs,
    },
    /// Base vs. comparison year trends
    Trends {
        /// Base year, or "all" for the average of every other year
        #[arg(long, default_value = "all")]
        base: crate::trends::BaseYear,
        /// Comparison year; defaults to the reference year when it has data
        #[arg(long)]
        comparison: Option<i32>,
        #[arg(long)]
        product: Option<String>,
    },
    /// Monthly orders and revenue
    Monthly {
        /// First month (YYYY-MM); defaults to January of the reference year
        #[arg(long)]
        start: Option<crate::sales::YearMonth>,
        /// Last month (YYYY-MM); defaults to the reference month
        #[arg(long)]
        end: Option<crate::sales::YearMonth>,
        /// Show merged detail lines of one category (order, government, private)
        #[arg(long)]
        detail: Option<crate::sales::Category>,
        /// Restrict the detail to one month (YYYY-MM)
        #[arg(long, requires = "detail")]
        month: Option<crate::sales::YearMonth>,
    },
    /// Production, shipments and stock per item
    Inventory {
        #[arg(long, default_value = "보행매트")]
        product_type: crate::inventory::ProductType,
        /// Year, or "all"; defaults to the reference year
        #[arg(long)]
        year: Option<YearChoice>,
        /// Month 1-12, or "all"; defaults to the reference month
        #[arg(long)]
        month: Option<MonthChoice>,
    },
}

/// `all` or a calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearChoice {
    All,
    Year(i32),
}

impl YearChoice {
    pub fn as_option(self) -> Option<i32> {
        match self {
            YearChoice::All => None,
            YearChoice::Year(y) => Some(y),
        }
    }
}

impl FromStr for YearChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" | "전체" => Ok(YearChoice::All),
            y => y
                .parse()
                .map(YearChoice::Year)
                .map_err(|_| format!("expected a year or 'all', got '{y}'")),
        }
    }
}

/// `all` or a month number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthChoice {
    All,
    Month(u32),
}

impl MonthChoice {
    pub fn as_option(self) -> Option<u32> {
        match self {
            MonthChoice::All => None,
            MonthChoice::Month(m) => Some(m),
        }
    }
}

impl FromStr for MonthChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" | "전체" => Ok(MonthChoice::All),
            m => match m.parse::<u32>() {
                Ok(n) if (1..=12).contains(&n) => Ok(MonthChoice::Month(n)),
                _ => Err(format!("expected a month 1-12 or 'all', got '{m}'")),
            },
        }
    }
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Year, or "all"; defaults to the analysis year of the reference date
    #[arg(long)]
    pub year: Option<YearChoice>,
    #[arg(long)]
    pub product: Option<String>,
    #[arg(long)]
    pub region: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub agency_type: Option<String>,
    /// Case-insensitive part of the agency name
    #[arg(long)]
    pub search: Option<String>,
}

impl FilterArgs {
    /// Filter for these arguments; `default_year` applies when no year was given.
    pub fn to_filter(&self, default_year: i32) -> RecordFilter {
        RecordFilter {
            year: self.year.map_or(Some(default_year), YearChoice::as_option),
            product: self.product.clone(),
            region: self.region.clone(),
            city: self.city.clone(),
            agency_type: self.agency_type.clone(),
            agency_search: self.search.clone(),
        }
    }
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SortArgs {
    /// Column clicks applied in order; repeating a column flips its direction
    #[arg(long = "sort", value_name = "COLUMN")]
    pub clicks: Vec<String>,
}

/// Settings read from the environment (and a `.env` file, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub relays: Vec<Relay>,
    pub timeout: Duration,
    pub inventory_url: Option<String>,
    pub own_supplier: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let relays = match std::env::var("DASHBOARD_RELAYS") {
            Ok(list) => list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Relay::new)
                .collect(),
            Err(_) => default_relays(),
        };
        let timeout_secs = match std::env::var("DASHBOARD_TIMEOUT_SECS") {
            Ok(v) => v
                .trim()
                .parse()
                .with_context(|| format!("DASHBOARD_TIMEOUT_SECS is not a number: {v}"))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            relays,
            timeout: Duration::from_secs(timeout_secs),
            inventory_url: std::env::var("DASHBOARD_INVENTORY_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            own_supplier: std::env::var("DASHBOARD_OWN_SUPPLIER")
                .unwrap_or_else(|_| DEFAULT_OWN_SUPPLIER.to_string()),
        })
    }

    /// Built-in exports, the inventory location from the environment, then
    /// the entries of `file` on top.
    pub fn registry(&self, file: Option<&PathBuf>) -> Result<Registry> {
        let mut registry = Registry::defaults();
        if let Some(url) = &self.inventory_url {
            registry.insert(INVENTORY, url.clone());
        }
        if let Some(path) = file {
            registry
                .merge_file(path)
                .with_context(|| format!("failed to read registry file {}", path.display()))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_and_month_choices() {
        assert_eq!("all".parse::<YearChoice>(), Ok(YearChoice::All));
        assert_eq!("2024".parse::<YearChoice>(), Ok(YearChoice::Year(2024)));
        assert!("24년".parse::<YearChoice>().is_err());
        assert_eq!("3".parse::<MonthChoice>(), Ok(MonthChoice::Month(3)));
        assert!("13".parse::<MonthChoice>().is_err());
    }

    #[test]
    fn filter_defaults_to_given_year() {
        let args = FilterArgs::default();
        assert_eq!(args.to_filter(2025).year, Some(2025));
        let all = FilterArgs {
            year: Some(YearChoice::All),
            ..FilterArgs::default()
        };
        assert_eq!(all.to_filter(2025).year, None);
    }

    #[test]
    fn cli_parses_global_and_view_options() {
        let args = Args::try_parse_from([
            "sales_report",
            "agencies",
            "--year",
            "all",
            "--sort",
            "amount",
            "--sort",
            "amount",
            "--reference-date",
            "2025-03-01",
        ])
        .unwrap();
        assert_eq!(args.reference_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        match args.command {
            Command::Agencies { filter, sort } => {
                assert_eq!(filter.year, Some(YearChoice::All));
                assert_eq!(sort.clicks, vec!["amount", "amount"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn registry_picks_up_inventory_location() {
        let config = Config {
            relays: default_relays(),
            timeout: Duration::from_secs(1),
            inventory_url: Some("https://example.test/inventory.csv".into()),
            own_supplier: DEFAULT_OWN_SUPPLIER.into(),
        };
        let registry = config.registry(None).unwrap();
        assert_eq!(registry.resolve(INVENTORY), Some("https://example.test/inventory.csv"));
    }
}
