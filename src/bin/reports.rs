//! Dashboard reports on the command line.
//!
//! Run: ./target/release/reports [section] [--handlers ANA,LUIS] [--export-dir out/]
//! Sections: all, summary, capacity, workload, flow, assignment, cycle, bottlenecks, forecast

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use logistics_ops::config::StoreSettings;
use logistics_ops::display::{label, truncate};
use logistics_ops::export::write_csv;
use logistics_ops::models::OperationRecord;
use logistics_ops::reports::{self, cycle_time, ReportFilter, SeasonalTrendForecaster};
use logistics_ops::store::fetch_all_operations;
use logistics_ops::telemetry;
use logistics_ops::OpsError;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "reports")]
struct Args {
    /// Section to print
    #[arg(default_value = "all")]
    section: String,

    /// Opening years, comma separated
    #[arg(long)]
    years: Option<String>,

    /// Opening months as YYYY-MM, comma separated
    #[arg(long)]
    months: Option<String>,

    /// Operation type codes, comma separated
    #[arg(long)]
    types: Option<String>,

    #[arg(long)]
    handlers: Option<String>,

    /// Forecast horizon in days
    #[arg(long, default_value = "90")]
    horizon: u32,

    /// Also write each table as CSV into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    #[command(flatten)]
    store: StoreSettings,
}

impl Args {
    fn filter(&self) -> Result<ReportFilter> {
        Ok(ReportFilter::from_lists(
            self.years.as_deref(),
            self.months.as_deref(),
            self.types.as_deref(),
            self.handlers.as_deref(),
        )?)
    }
}

const SECTIONS: [&str; 8] = [
    "summary",
    "capacity",
    "workload",
    "flow",
    "assignment",
    "cycle",
    "bottlenecks",
    "forecast",
];

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn export<T: Serialize>(dir: &Option<PathBuf>, name: &str, rows: &[T]) -> Result<()> {
    if let Some(dir) = dir {
        let path = dir.join(format!("{}.csv", name));
        write_csv(&path, rows)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let args = Args::parse();
    let filter = args.filter()?;
    let section = args.section.to_lowercase();
    if section != "all" && !SECTIONS.contains(&section.as_str()) {
        bail!("unknown section '{}', expected one of: all, {}", section, SECTIONS.join(", "));
    }

    let store = args.store.connect().await?;
    let all = fetch_all_operations(&store).await?;
    let dated: Vec<OperationRecord> = all.into_iter().filter(|op| op.opened_on.is_some()).collect();
    let ops = filter.apply(&dated);
    info!("{} operations after filtering", ops.len());

    let run = |name: &str| section == "all" || section == name;

    if run("summary") {
        run_summary_section(&ops, &args.export_dir)?;
    }
    if run("capacity") {
        run_capacity_section(&ops, &args.export_dir)?;
    }
    if run("workload") {
        run_workload_section(&ops, &args.export_dir)?;
    }
    if run("flow") {
        run_flow_section(&ops, &args.export_dir)?;
    }
    if run("assignment") {
        run_assignment_section(&ops, &args.export_dir)?;
    }
    if run("cycle") {
        run_cycle_section(&ops, &args.export_dir)?;
    }
    if run("bottlenecks") {
        run_bottleneck_section(&ops, &args.export_dir)?;
    }
    if run("forecast") {
        run_forecast_section(&ops, args.horizon, &args.export_dir)?;
    }

    Ok(())
}

fn run_summary_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("OPERATIONS SUMMARY");
    let summary = reports::operations_summary(ops);
    println!("Total operations: {}", summary.total);

    print_subsection("By handler and type");
    println!("{:<25} {:>6} {:>10}", "Handler", "Type", "Operations");
    for row in &summary.by_handler_type {
        println!(
            "{:<25} {:>6} {:>10}",
            truncate(label(&row.handler), 25),
            label(&row.op_type),
            row.operations
        );
    }

    print_subsection("Monthly trend");
    for m in &summary.monthly_trend {
        println!("{:<10} {:>6}  {}", m.month, m.operations, "█".repeat((m.operations / 5).min(50)));
    }

    print_subsection("Type distribution");
    for t in &summary.type_distribution {
        println!("{:<6} {:<12} {:>6}", label(&t.op_type), t.label.unwrap_or("-"), t.operations);
    }

    print_subsection("Top handlers");
    for (i, h) in summary.top_handlers.iter().enumerate() {
        println!("{:>3}. {:<25} {:>6}", i + 1, truncate(label(&h.handler), 25), h.operations);
    }

    export(export_dir, "summary", &summary.by_handler_type)
}

fn run_capacity_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("CAPACITY");
    let rows = reports::capacity(ops);
    println!(
        "{:<25} {:>5} {:>6} {:>7} {:>6} {:>10}",
        "Handler", "Type", "Open", "Closed", "Quota", "Available"
    );
    println!("{}", "─".repeat(65));
    for r in &rows {
        println!(
            "{:<25} {:>5} {:>6} {:>7} {:>6} {:>10}",
            truncate(label(&r.handler), 25),
            label(&r.op_type),
            r.open,
            r.closed,
            r.quota,
            r.available
        );
    }
    export(export_dir, "capacity", &rows)
}

fn run_workload_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("WORKLOAD BALANCE");
    let balance = reports::workload_balance(ops);
    println!("{:<25} {:>6} {:>8}", "Handler", "Open", "Effort");
    println!("{}", "─".repeat(42));
    for w in &balance.handlers {
        println!("{:<25} {:>6} {:>8}", truncate(label(&w.handler), 25), w.open_operations, w.effort);
    }
    if !balance.hidden_overload.is_empty() {
        print_subsection("Hidden overload (heavy effort, ordinary count)");
        for w in &balance.hidden_overload {
            println!("  {} ({} open, effort {})", label(&w.handler), w.open_operations, w.effort);
        }
    }
    export(export_dir, "workload", &balance.handlers)
}

fn run_flow_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("FLOW CLASSIFICATION");
    let months = reports::months_spanned(ops);
    println!("Months covered: {}\n", months);
    let rows = reports::flow_index(ops, months);
    println!(
        "{:<25} {:>5} {:>7} {:>9} {:>6} {:>8} {:>8}",
        "Handler", "Type", "Total", "Monthly", "Quota", "Index", "Level"
    );
    println!("{}", "─".repeat(75));
    for r in &rows {
        println!(
            "{:<25} {:>5} {:>7} {:>9.2} {:>6} {:>7.1}% {:>8}",
            truncate(label(&r.handler), 25),
            label(&r.op_type),
            r.total,
            r.monthly_average,
            r.quota,
            r.flow_index,
            r.level.as_str()
        );
    }
    export(export_dir, "flow", &rows)
}

fn run_assignment_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("ASSIGNMENT GUIDE");
    let scores = reports::assignment_ranking(ops);
    if scores.is_empty() {
        println!("Every handler has reached the ideal capacity.");
        return Ok(());
    }
    println!(
        "{:>5} {:<25} {:>10} {:>10} {:>9} {:>8}",
        "Type", "Handler", "Available", "Avg days", "On time", "Score"
    );
    println!("{}", "─".repeat(72));
    for s in &scores {
        let on_time = s
            .on_time_rate
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5} {:<25} {:>10} {:>10.1} {:>9} {:>8.2}",
            label(&s.op_type),
            truncate(label(&s.handler), 25),
            s.available,
            s.avg_cycle_days,
            on_time,
            s.display_score()
        );
    }
    export(export_dir, "assignment", &scores)
}

fn run_cycle_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("CYCLE TIMES");
    let report = reports::cycle_time_report(ops);
    println!("Closed operations with valid dates: {}", report.closed_operations);

    print_subsection("Against standard times");
    println!("{:<12} {:>9} {:>7} {:>8} {:>7}", "Type", "Standard", "Target", "Actual", "Closed");
    for s in &report.standards {
        let actual = s
            .actual_mean_days
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{:<12} {:>9} {:>7} {:>8} {:>7}",
            s.label, s.standard_days, s.target_days, actual, s.closed
        );
    }

    print_subsection("By handler");
    println!("{:<25} {:>6} {:>8} {:>6} {:>6}", "Handler", "Count", "Mean", "Min", "Max");
    for g in &report.by_handler {
        println!(
            "{:<25} {:>6} {:>8.1} {:>6} {:>6}",
            truncate(label(&g.group), 25),
            g.count,
            g.mean_days,
            g.min_days,
            g.max_days
        );
    }

    print_subsection("On-time rate");
    for r in &report.on_time {
        println!(
            "{:<25} {:>5} {:>4}/{:<4} {:>6.1}%",
            truncate(label(&r.handler), 25),
            label(&r.op_type),
            r.on_time,
            r.closed,
            r.rate * 100.0
        );
    }

    export(export_dir, "cycle_standards", &report.standards)?;
    export(export_dir, "cycle_by_handler", &report.by_handler)
}

fn run_bottleneck_section(ops: &[OperationRecord], export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("BOTTLENECKS");
    let report = match cycle_time::bottlenecks(&reports::cycle_durations(ops)) {
        Ok(report) => report,
        Err(OpsError::InsufficientHistory(msg)) => {
            println!("Not enough closed operations for a diagnosis: {}", msg);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!(
        "{} of {} closed operations took longer than {:.1} days (80th percentile)",
        report.slow_operations, report.closed_operations, report.threshold_days
    );
    for (title, rows) in [
        ("Types", &report.top_types),
        ("Handlers", &report.top_handlers),
        ("Clients", &report.top_clients),
    ] {
        print_subsection(title);
        for r in rows {
            println!("  {:<30} {:>5}", truncate(label(&r.value), 30), r.count);
        }
    }
    export(export_dir, "bottleneck_handlers", &report.top_handlers)
}

fn run_forecast_section(ops: &[OperationRecord], horizon: u32, export_dir: &Option<PathBuf>) -> Result<()> {
    print_section_header("VOLUME FORECAST");
    let forecast = match reports::forecast_volume(ops, horizon, &SeasonalTrendForecaster) {
        Ok(forecast) => forecast,
        Err(OpsError::InsufficientHistory(msg)) => {
            println!("Not enough history to forecast: {}", msg);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let total: f64 = forecast.points.iter().map(|p| p.expected).sum();
    println!(
        "Model {} over {} days of history; {} days ahead, about {:.0} new operations",
        forecast.model,
        forecast.history.len(),
        forecast.horizon_days,
        total
    );
    print_subsection("Next two weeks");
    println!("{:<12} {:>9} {:>9} {:>9}", "Date", "Expected", "Low", "High");
    for p in forecast.points.iter().take(14) {
        println!("{:<12} {:>9.1} {:>9.1} {:>9.1}", p.date.to_string(), p.expected, p.lower, p.upper);
    }
    export(export_dir, "forecast", &forecast.points)
}
