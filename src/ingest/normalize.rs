//! Header normalization and row extraction for spreadsheet exports.
//!
//! Exports arrive with whatever headers the source spreadsheet had: accented,
//! mixed case, padded, with stray `Unnamed: N` columns. Headers are folded to
//! a canonical snake-case vocabulary and mapped onto [`UploadRow`] fields.

use std::borrow::Cow;
use std::io::Read;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::{OpsError, Result};
use crate::models::UploadRow;

static UNNAMED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*unnamed").unwrap());
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Legacy header spellings, applied after normalization.
const RENAMES: [(&str, &str); 1] = [("fch_primera_fact_prov", "fecha_primera_factura")];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Record field a canonical header maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    File,
    ClientId,
    Client,
    OpType,
    Handler,
    Salesperson,
    BillingRoute,
    Status,
    OpenedOn,
    FirstInvoiceOn,
    ArrivalOn,
    DepartureOn,
    InvoicedOn,
    ClosingSentOn,
    ClosedOn,
}

impl Field {
    pub fn from_header(header: &str) -> Option<Self> {
        let field = match header {
            "file" => Field::File,
            "nit_cliente" | "client_id" => Field::ClientId,
            "cliente" | "client" => Field::Client,
            "tipo" | "type" | "op_type" => Field::OpType,
            "operativo" | "handler" => Field::Handler,
            "comercial" | "salesperson" => Field::Salesperson,
            "envio_facturar" | "billing_route" => Field::BillingRoute,
            "estado" | "status" => Field::Status,
            "fecha_file" | "opened_on" => Field::OpenedOn,
            "fecha_primera_factura" | "first_invoice_on" => Field::FirstInvoiceOn,
            "fecha_arribo" | "arrival_on" => Field::ArrivalOn,
            "fecha_zarpe" | "departure_on" => Field::DepartureOn,
            "fecha_de_factura" | "invoiced_on" => Field::InvoicedOn,
            "fecha_envio_cierre" | "closing_sent_on" => Field::ClosingSentOn,
            "fecha_cierre" | "closed_on" => Field::ClosedOn,
            _ => return None,
        };
        Some(field)
    }
}

/// Canonical form of a raw header, or `None` for export artifacts.
pub fn normalize_header(raw: &str) -> Option<String> {
    if UNNAMED.is_match(raw) {
        return None;
    }
    let ascii: String = raw.nfkd().filter(char::is_ascii).collect();
    let lower = ascii.to_lowercase();
    let collapsed = NON_ALNUM.replace_all(&lower, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        return None;
    }
    let renamed = RENAMES
        .iter()
        .find(|(from, _)| *from == trimmed)
        .map(|(_, to)| *to)
        .unwrap_or(trimmed);
    Some(renamed.to_string())
}

/// Trimmed text, or `None` when blank.
pub fn raw_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Lenient date parsing: anything unrecognized becomes `None`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Column positions of an upload, resolved once from its header row.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    columns: Vec<Option<Field>>,
    headers: Vec<String>,
}

impl ColumnMap {
    pub fn from_headers<I, S>(raw_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns = Vec::new();
        let mut headers = Vec::new();
        let mut seen = Vec::new();
        for raw in raw_headers {
            let canonical = normalize_header(raw.as_ref());
            let field = canonical.as_deref().and_then(Field::from_header);
            match (canonical, field) {
                (Some(name), Some(field)) if !seen.contains(&field) => {
                    seen.push(field);
                    headers.push(name);
                    columns.push(Some(field));
                }
                (Some(name), _) => {
                    debug!("Ignoring column '{}'", name);
                    headers.push(name);
                    columns.push(None);
                }
                (None, _) => columns.push(None),
            }
        }
        Self { columns, headers }
    }

    /// Canonical headers that survived artifact stripping.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains(&Some(field))
    }

    pub fn row<'a, I>(&self, values: I) -> UploadRow
    where
        I: IntoIterator<Item = Cow<'a, str>>,
    {
        let mut row = UploadRow::empty(None);
        for (field, value) in self.columns.iter().zip(values) {
            let Some(field) = field else { continue };
            match field {
                Field::File => row.file = raw_text(&value),
                Field::ClientId => row.client_id = raw_text(&value),
                Field::Client => row.client = raw_text(&value),
                Field::OpType => row.op_type = raw_text(&value),
                Field::Handler => row.handler = raw_text(&value),
                Field::Salesperson => row.salesperson = raw_text(&value),
                Field::BillingRoute => row.billing_route = raw_text(&value),
                Field::Status => row.status = raw_text(&value),
                Field::OpenedOn => row.opened_on = parse_date(&value),
                Field::FirstInvoiceOn => row.first_invoice_on = parse_date(&value),
                Field::ArrivalOn => row.arrival_on = parse_date(&value),
                Field::DepartureOn => row.departure_on = parse_date(&value),
                Field::InvoicedOn => row.invoiced_on = parse_date(&value),
                Field::ClosingSentOn => row.closing_sent_on = parse_date(&value),
                Field::ClosedOn => row.closed_on = parse_date(&value),
            }
        }
        row
    }
}

/// Spreadsheet exports are not always UTF-8; fall back to Latin-1.
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Reads a CSV export into upload rows.
pub fn read_upload<R: Read>(reader: R) -> Result<(ColumnMap, Vec<UploadRow>)> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header_record = csv_reader
        .byte_headers()
        .map_err(|e| OpsError::MalformedInput(format!("unreadable header row: {}", e)))?
        .clone();
    let map = ColumnMap::from_headers(header_record.iter().map(decode));

    let mut rows = Vec::new();
    let mut record = ByteRecord::new();
    loop {
        match csv_reader.read_byte_record(&mut record) {
            Ok(true) => rows.push(map.row(record.iter().map(decode))),
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                return Err(OpsError::MalformedInput(format!("line {}: {}", line, e)));
            }
        }
    }

    debug!("Read {} rows with columns {:?}", rows.len(), map.headers());
    Ok((map, rows))
}
