//! Synthetic export generator for the operations dashboard.
//!
//! Writes a CSV shaped like the operations system's spreadsheet export,
//! including the mess real exports carry: accented headers, an unnamed
//! trailing column, repeated file numbers, blank handlers, unparseable dates
//! and mixed-case values.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --rows <N>             Operations to generate (default: 2000)
//!   --start <YYYY-MM-DD>   First opening date (default: 2023-01-01)
//!   --days <N>             Days the openings spread over (default: 540)
//!   --duplicate-rate <F>   Probability of repeating a previous row (default: 0.03)
//!   --blank-rate <F>       Probability of blanking a handler or type (default: 0.02)
//!   --seed <N>             Random seed for reproducibility (optional)
//!   --output <PATH>        Output CSV path (default: data/synthetic_operations.csv)

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use clap::Parser;
use csv::WriterBuilder;
use rand::prelude::*;
use rand::rngs::StdRng;

#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate a synthetic operations export")]
struct Args {
    #[arg(long, default_value_t = 2000)]
    rows: usize,

    #[arg(long, default_value = "2023-01-01")]
    start: NaiveDate,

    #[arg(long, default_value_t = 540)]
    days: i64,

    #[arg(long, default_value_t = 0.03)]
    duplicate_rate: f64,

    #[arg(long, default_value_t = 0.02)]
    blank_rate: f64,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "data/synthetic_operations.csv")]
    output: PathBuf,
}

const HEADERS: [&str; 16] = [
    "FILE",
    "NIT Cliente",
    "Cliente",
    "Tipo",
    "Operativo",
    "Comercial",
    "Envío Facturar",
    "Estado",
    "Fecha File",
    "FCH Primera Fact Prov",
    "Fecha Arribo",
    "Fecha Zarpe",
    "Fecha de Factura",
    "Fecha Envío Cierre",
    "Fecha Cierre",
    "Unnamed: 15",
];

/// Operation type code with its weight and typical cycle in days.
const TYPES: [(&str, u32, i64); 7] = [
    ("A", 30, 18),
    ("M", 25, 75),
    ("F", 8, 80),
    ("B", 6, 85),
    ("S", 8, 90),
    ("T", 15, 20),
    ("C", 8, 12),
];

const HANDLERS: [&str; 9] = [
    "ANA TORRES",
    "LUIS PEREZ",
    "MARIA GOMEZ",
    "CARLOS RUIZ",
    "SOFIA DIAZ",
    "JORGE CASTRO",
    "LAURA MEJIA",
    "PEDRO ROJAS",
    "DIANA LOPEZ",
];

const CLIENTS: [(&str, &str); 8] = [
    ("900123456", "Importadora Andina S.A.S."),
    ("800987654", "Textiles del Pacífico"),
    ("901555222", "Agroexport Caribe"),
    ("830111999", "Farmacéutica Nacional"),
    ("890444777", "Ferretería El Puerto"),
    ("900777333", "Café Montaña Alta"),
    ("860222888", "Electrónica Global Ltda"),
    ("901999000", "Distribuidora Norte"),
];

const SALESPEOPLE: [&str; 4] = ["RAUL ORTIZ", "CAMILA VEGA", "ANDRES MORA", "PAULA RIOS"];

const BILLING_ROUTES: [&str; 3] = ["DIRECTO", "AGENTE", "CLIENTE"];

fn pick_type(rng: &mut impl Rng) -> (&'static str, i64) {
    let total: u32 = TYPES.iter().map(|t| t.1).sum();
    let mut roll = rng.gen_range(0..total);
    for (code, weight, cycle) in TYPES {
        if roll < weight {
            return (code, cycle);
        }
        roll -= weight;
    }
    ("A", 18)
}

/// Renders a date in one of the layouts the export has been seen to use.
fn render_date(date: NaiveDate, rng: &mut impl Rng) -> String {
    match rng.gen_range(0..10) {
        0 => date.format("%d/%m/%Y").to_string(),
        1 => date.format("%Y-%m-%d 00:00:00").to_string(),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

/// Occasionally lower-cases or pads a text value.
fn scuff(value: &str, rng: &mut impl Rng) -> String {
    match rng.gen_range(0..20) {
        0 => value.to_lowercase(),
        1 => format!(" {} ", value),
        _ => value.to_string(),
    }
}

fn blank_out(value: String, rate: f64, rng: &mut impl Rng) -> String {
    if rng.gen_bool(rate) {
        String::new()
    } else {
        value
    }
}

fn generate_row(index: usize, args: &Args, rng: &mut impl Rng) -> Vec<String> {
    let (op_type, cycle) = pick_type(rng);
    let handler = HANDLERS[rng.gen_range(0..HANDLERS.len())];
    let (client_id, client) = CLIENTS[rng.gen_range(0..CLIENTS.len())];
    let opened = args.start + Duration::days(rng.gen_range(0..args.days.max(1)));

    // Older operations are more likely to be closed.
    let age = (args.start + Duration::days(args.days) - opened).num_days();
    let closed = rng.gen_bool((age as f64 / (cycle as f64 * 2.0)).clamp(0.05, 0.95));
    let span = (cycle as f64 * rng.gen_range(0.4..1.8)).round() as i64;
    let closed_on = opened + Duration::days(span);

    let departure = opened + Duration::days(rng.gen_range(1..=cycle / 2 + 1));
    let arrival = departure + Duration::days(rng.gen_range(2..=cycle / 2 + 3));
    let invoiced = arrival + Duration::days(rng.gen_range(1..=5));

    let opened_text = if rng.gen_bool(0.01) {
        "SIN FECHA".to_string()
    } else if rng.gen_bool(0.01) {
        String::new()
    } else {
        render_date(opened, rng)
    };

    let status = match (closed, rng.gen_bool(0.5)) {
        (true, true) => "CERRADO",
        (true, false) => "CLOSED",
        (false, true) => "ABIERTO",
        (false, false) => "EN PROCESO",
    };

    let op_type = scuff(op_type, rng);
    let op_type = blank_out(op_type, args.blank_rate, rng);
    let handler = scuff(handler, rng);
    let handler = blank_out(handler, args.blank_rate, rng);

    vec![
        format!("{}-{:05}", opened.format("%y"), index + 1),
        client_id.to_string(),
        client.to_string(),
        op_type,
        handler,
        SALESPEOPLE[rng.gen_range(0..SALESPEOPLE.len())].to_string(),
        BILLING_ROUTES[rng.gen_range(0..BILLING_ROUTES.len())].to_string(),
        scuff(status, rng),
        opened_text,
        render_date(invoiced - Duration::days(1), rng),
        render_date(arrival, rng),
        render_date(departure, rng),
        render_date(invoiced, rng),
        if closed { render_date(closed_on - Duration::days(1), rng) } else { String::new() },
        if closed { render_date(closed_on, rng) } else { String::new() },
        String::new(),
    ]
}

fn main() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.duplicate_rate) && (0.0..=1.0).contains(&args.blank_rate),
        "rates must be between 0 and 1"
    );

    println!("🔧 Synthetic Operations Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Output:           {}", args.output.display());
    println!("Rows:             {}", args.rows);
    println!("Opening window:   {} + {} days", args.start, args.days);
    println!("Duplicate rate:   {:.1}%", args.duplicate_rate * 100.0);
    println!("Blank rate:       {:.1}%", args.blank_rate * 100.0);
    if let Some(seed) = args.seed {
        println!("Random seed:      {}", seed);
    }
    println!();

    let mut rng: StdRng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_path(&args.output)?;
    writer.write_record(HEADERS)?;

    let mut written: Vec<Vec<String>> = Vec::with_capacity(args.rows);
    let mut duplicates = 0;
    for i in 0..args.rows {
        let row = if !written.is_empty() && rng.gen_bool(args.duplicate_rate) {
            duplicates += 1;
            written[rng.gen_range(0..written.len())].clone()
        } else {
            generate_row(i, &args, &mut rng)
        };
        writer.write_record(&row)?;
        written.push(row);

        if (i + 1) % 1000 == 0 {
            println!("   Generated {} rows...", i + 1);
        }
    }
    writer.flush()?;

    println!();
    println!("✅ Done!");
    println!("   Rows written:     {}", written.len());
    println!("   Repeated rows:    {}", duplicates);
    println!("   Output:           {}", args.output.display());

    Ok(())
}
