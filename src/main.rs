// Entry point and high-level CLI flow.
//
// One invocation loads what the chosen view needs, builds a session over it
// and prints (or exports) that view:
// - procurement views load and merge the three procurement exports,
// - `monthly` loads the monthly sales sheet,
// - `inventory` loads the inventory sheet.
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sales_report::clean::normalize;
use sales_report::config::{Args, Command, Config, FilterArgs, SortArgs};
use sales_report::fetch::HttpTransport;
use sales_report::inventory::{self, Period, ProductType};
use sales_report::loader::{Loader, INVENTORY, MONTHLY_SALES};
use sales_report::output;
use sales_report::sales::{self, Category, DetailScope, YearMonth};
use sales_report::session::{Session, TableId};
use sales_report::sort::TableRow;
use sales_report::trends::{default_comparison_year, BaseYear};
use sales_report::types::{AgencyRankRow, ContractRow, CustomerRow, SupplierAgencyRow, SupplierRankRow};
use sales_report::util::{self, default_analysis_year};

/// Where a view goes: console previews or JSON, plus optional CSV files.
struct Printer {
    export_dir: Option<PathBuf>,
    json: bool,
    preview_rows: usize,
}

impl Printer {
    fn sorted<T>(&self, file: &str, title: &str, rows: &[T], session: &Session, table: TableId) -> Result<()>
    where
        T: Tabled + TableRow,
    {
        if !self.json {
            output::preview_sorted(title, rows, Some(&session.sorts.get(table)), self.preview_rows);
        }
        self.export(file, rows)
    }

    fn plain<T>(&self, file: &str, title: &str, rows: &[T]) -> Result<()>
    where
        T: Tabled + Clone,
    {
        if !self.json {
            output::preview_table_rows(title, rows, self.preview_rows);
        }
        self.export(file, rows)
    }

    fn export<T: Tabled>(&self, file: &str, rows: &[T]) -> Result<()> {
        let Some(dir) = &self.export_dir else {
            return Ok(());
        };
        let path = dir.join(format!("{file}.csv"));
        output::export_table(&path, rows).with_context(|| format!("failed to write {}", path.display()))?;
        if !self.json {
            println!("(Full table exported to {})\n", path.display());
        }
        Ok(())
    }

    /// The whole view as JSON: printed with `--json`, written as
    /// `<file>.json` next to the CSV exports.
    fn view<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        if self.json {
            output::print_json(value)?;
        }
        if let Some(dir) = &self.export_dir {
            let path = dir.join(format!("{file}.json"));
            output::write_json(&path, value).with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(())
    }
}

/// Apply `--sort` clicks to `table` in order.
fn apply_clicks<T: TableRow>(session: &mut Session, table: TableId, sort: &SortArgs) -> Result<()> {
    for key in &sort.clicks {
        let Some(col) = T::column(key) else {
            let keys: Vec<&str> = T::columns().iter().map(|c| c.key).collect();
            bail!("unknown sort column '{key}' (one of: {})", keys.join(", "));
        };
        let state = session.click_sort(table, col.key, col.kind);
        info!(column = col.key, direction = ?state.direction, "sort");
    }
    Ok(())
}

fn apply_filter(session: &mut Session, filter: &FilterArgs) {
    session.filter = filter.to_filter(default_analysis_year(session.reference()));
    if let (Some(region), Some(city)) = (&session.filter.region, &session.filter.city) {
        let cities = session.cities(region);
        if !cities.contains(city) {
            warn!(%region, %city, ?cities, "city does not belong to the region, no record will match");
        }
    }
}

fn year_label(year: Option<i32>) -> String {
    year.map_or_else(|| "전체 연도".to_string(), |y| format!("{y}년"))
}

fn print_summary(label: &str, stats: &sales_report::types::SummaryStats) {
    println!(
        "{}: {} | 계약건수: {} | 총 금액: {}",
        label,
        util::format_count(&stats.counterparties),
        util::format_count(&stats.contracts),
        util::format_currency(&stats.total_amount)
    );
}

fn procurement_view(mut session: Session, command: Command, out: &Printer) -> Result<()> {
    match command {
        Command::Agencies { filter, sort } => {
            apply_filter(&mut session, &filter);
            apply_clicks::<AgencyRankRow>(&mut session, TableId::AgencyRank, &sort)?;
            let rows = session.agency_ranking();
            out.view("agency_ranking", &rows)?;
            let title = format!("수요기관 구매 순위 ({})", year_label(session.filter.year));
            out.sorted("agency_ranking", &title, &rows, &session, TableId::AgencyRank)?;
        }
        Command::Agency { name, filter } => {
            apply_filter(&mut session, &filter);
            session.open_agency(name);
            let Some(detail) = session.agency_detail() else {
                return Ok(());
            };
            out.view("agency_detail", &detail)?;
            if !out.json {
                let t = &detail.trend;
                println!("\n{}", detail.agency);
                println!(
                    "5년 평균: {} | 최고 구매연도: {} | {}년 구매액: {} ({})",
                    util::format_currency(&(t.average.round() as i64)),
                    t.peak_year.map_or_else(|| "-".to_string(), |y| format!("{y}년")),
                    t.summary_year,
                    util::format_currency(&t.summary_amount),
                    util::format_ratio(&t.vs_avg)
                );
            }
            out.plain("agency_trend", "연도별 구매 추이", &detail.trend.years)?;
            out.sorted("agency_suppliers", "업체별 구매 비중", &detail.suppliers, &session, TableId::AgencySuppliers)?;
            out.sorted("agency_contracts", "계약 내역", &detail.contracts, &session, TableId::AgencyContracts)?;
        }
        Command::Suppliers { filter, sort } => {
            apply_filter(&mut session, &filter);
            apply_clicks::<SupplierRankRow>(&mut session, TableId::Suppliers, &sort)?;
            let summary = session.supplier_summary();
            let rows = session.supplier_ranking();
            out.view("supplier_ranking", &rows)?;
            if !out.json {
                print_summary("\n업체 수", &summary);
            }
            let title = format!("업체별 판매 순위 ({})", year_label(session.filter.year));
            out.sorted("supplier_ranking", &title, &rows, &session, TableId::Suppliers)?;
        }
        Command::Supplier { name, filter } => {
            apply_filter(&mut session, &filter);
            let rows = session.supplier_detail(&name);
            out.view("supplier_detail", &rows)?;
            let title = format!("{name} 판매 수요기관");
            out.sorted::<SupplierAgencyRow>("supplier_detail", &title, &rows, &session, TableId::SupplierDetail)?;
        }
        Command::Customers { customer, filter, sort } => {
            apply_filter(&mut session, &filter);
            if let Some(customer) = customer {
                apply_clicks::<ContractRow>(&mut session, TableId::CustomerDetail, &sort)?;
                let rows = session.customer_detail(&customer);
                out.view("customer_detail", &rows)?;
                let title = format!("{customer} 계약 내역");
                out.sorted("customer_detail", &title, &rows, &session, TableId::CustomerDetail)?;
                return Ok(());
            }
            apply_clicks::<CustomerRow>(&mut session, TableId::Customers, &sort)?;
            let view = session.customer_view();
            out.view("customers", &view)?;
            if !out.json {
                println!("\n{} 고객 분석 ({})", session.own_supplier(), year_label(session.filter.year));
                print_summary("고객 수", &view.summary);
            }
            out.sorted("customers", "고객별 매출", &view.customers, &session, TableId::Customers)?;
            out.sorted("customer_regions", "지역별 매출", &view.regions, &session, TableId::CustomerRegions)?;
            out.sorted("customer_types", "소관구분별 매출", &view.agency_types, &session, TableId::CustomerTypes)?;
        }
        Command::Trends { base, comparison, product } => {
            session.filter.product = product;
            let years = session.filter_options().years;
            let Some(comparison) = comparison.or_else(|| default_comparison_year(&years, session.reference().year()))
            else {
                bail!("no dated records to compare");
            };
            trends_view(&session, base, comparison, out)?;
        }
        other => bail!("not a procurement view: {other:?}"),
    }
    Ok(())
}

fn trends_view(session: &Session, base: BaseYear, comparison: i32, out: &Printer) -> Result<()> {
    let t = session.trends(base, comparison)?;
    out.view("trends", &t)?;
    if !out.json {
        println!("\n{} 대비 {} 추이", t.base_label, t.comparison_label);
    }
    out.plain("trend_monthly", "월별 추이", &t.monthly)?;
    out.plain("trend_regions", "지역별 추이", &t.regional)?;
    out.plain("trend_agency_types", "소관구분별 추이", &t.agency_types)?;
    Ok(())
}

async fn monthly_view(
    loader: &Loader,
    reference: NaiveDate,
    range: (Option<YearMonth>, Option<YearMonth>),
    detail: Option<(Category, Option<YearMonth>)>,
    out: &Printer,
) -> Result<()> {
    let raw = loader.load(MONTHLY_SALES).await?;
    let entries = sales::normalize_sales(&raw);

    let start = range.0.unwrap_or(YearMonth {
        year: reference.year(),
        month: 1,
    });
    let end = range.1.unwrap_or(YearMonth {
        year: reference.year(),
        month: reference.month(),
    });
    let summary = sales::monthly_summary(&entries, start, end)?;

    let Some((category, month)) = detail else {
        let rows = summary.rows();
        out.view("monthly_sales", &summary)?;
        out.plain("monthly_sales", &format!("월별 매출 현황 ({start} ~ {end})"), &rows)?;
        return Ok(());
    };

    let scope = month.map_or(DetailScope::WholeRange, DetailScope::Month);
    let session_sort = TableId::SalesDetail.default_sort();
    let rows = sales::sales_detail(&summary, scope, category, &session_sort);
    out.view("sales_detail", &rows)?;
    if out.json {
        return Ok(());
    }
    let period = month.map_or_else(|| format!("{start} ~ {end}"), |m| m.to_string());
    let title = format!("{} 상세 ({})", category.label(), period);
    output::preview_sorted(&title, &rows, Some(&session_sort), out.preview_rows);
    for row in rows.iter().take(out.preview_rows).filter(|r| !r.items.is_empty()) {
        output::preview_table_rows(&format!("{} / {}", row.contract_name, row.customer), &row.items, out.preview_rows);
    }
    out.export("sales_detail", &rows)
}

async fn inventory_view(
    loader: &Loader,
    product: ProductType,
    period: Period,
    out: &Printer,
) -> Result<()> {
    let raw = loader.load(INVENTORY).await?;
    let snap = inventory::snapshot(&raw, product, period);
    out.view("inventory", &snap)?;
    if !out.json {
        println!(
            "\n{} 재고 현황 | 생산: {}m | 출고: {}m | 재고: {}m",
            product,
            util::format_int(snap.total_produced),
            util::format_int(snap.total_shipped),
            util::format_int(snap.total_stock)
        );
    }
    out.plain("inventory", "품목별 재고", &snap.rows)
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()?;
    let timeout = args.timeout_secs.map_or(config.timeout, Duration::from_secs);
    let registry = config.registry(args.registry.as_ref())?;
    let transport = HttpTransport::new(timeout).context("failed to build HTTP client")?;
    let loader = Loader::new(registry, Arc::new(transport), config.relays.clone());
    let reference = args.reference_date.unwrap_or_else(|| Local::now().date_naive());

    if let Some(dir) = &args.export {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let out = Printer {
        export_dir: args.export,
        json: args.json,
        preview_rows: args.preview_rows,
    };

    match args.command {
        Command::Monthly { start, end, detail, month } => {
            monthly_view(&loader, reference, (start, end), detail.map(|c| (c, month)), &out).await
        }
        Command::Inventory { product_type, year, month } => {
            let period = Period {
                year: year.map_or(Some(reference.year()), |y| y.as_option()),
                month: month.map_or(Some(reference.month()), |m| m.as_option()),
            };
            inventory_view(&loader, product_type, period, &out).await
        }
        command => {
            let raw = loader.load_procurement().await?;
            let (records, report) = normalize(&raw);
            if !out.json {
                println!(
                    "Processing dataset... ({} rows loaded, {} kept)",
                    util::format_int(report.total_rows),
                    util::format_int(report.retained_rows)
                );
            }
            let session = Session::new(records, reference).with_own_supplier(config.own_supplier);
            procurement_view(session, command, &out)
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{e:#}");
        eprintln!("데이터를 불러오는 중 오류가 발생했습니다: {e:#}");
        std::process::exit(1);
    }
}
