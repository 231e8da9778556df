use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Operation type codes used by the desk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationType {
    Air,
    Maritime,
    Interflow,
    Bertschi,
    Shanghai,
    Land,
    Customs,
}

impl OperationType {
    pub const ALL: [OperationType; 7] = [
        OperationType::Air,
        OperationType::Maritime,
        OperationType::Interflow,
        OperationType::Bertschi,
        OperationType::Shanghai,
        OperationType::Land,
        OperationType::Customs,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Some(OperationType::Air),
            "M" => Some(OperationType::Maritime),
            "F" => Some(OperationType::Interflow),
            "B" => Some(OperationType::Bertschi),
            "S" => Some(OperationType::Shanghai),
            "T" => Some(OperationType::Land),
            "C" => Some(OperationType::Customs),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            OperationType::Air => "A",
            OperationType::Maritime => "M",
            OperationType::Interflow => "F",
            OperationType::Bertschi => "B",
            OperationType::Shanghai => "S",
            OperationType::Land => "T",
            OperationType::Customs => "C",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationType::Air => "Air",
            OperationType::Maritime => "Maritime",
            OperationType::Interflow => "Interflow",
            OperationType::Bertschi => "Bertschi",
            OperationType::Shanghai => "Shanghai",
            OperationType::Land => "Land",
            OperationType::Customs => "Customs",
        }
    }

    /// Ideal number of operations a handler carries per month.
    pub fn ideal_monthly_quota(self) -> u32 {
        match self {
            OperationType::Air => 15,
            OperationType::Maritime => 10,
            OperationType::Interflow => 8,
            OperationType::Bertschi => 8,
            OperationType::Shanghai => 10,
            OperationType::Land => 12,
            OperationType::Customs => 5,
        }
    }

    /// Expected days from opening to closing.
    pub fn standard_cycle_days(self) -> u32 {
        match self {
            OperationType::Air | OperationType::Land | OperationType::Customs => 30,
            _ => 90,
        }
    }

    /// Improvement target in days.
    pub fn target_cycle_days(self) -> u32 {
        match self {
            OperationType::Air => 20,
            OperationType::Land | OperationType::Customs => 15,
            _ => 70,
        }
    }

    /// Relative effort of keeping one operation of this type open.
    pub fn effort_points(self) -> u32 {
        match self {
            OperationType::Air | OperationType::Land | OperationType::Customs => 3,
            _ => 9,
        }
    }
}

/// Quota for a raw type code; unknown codes have no quota.
pub fn quota_for(code: Option<&str>) -> u32 {
    code.and_then(OperationType::from_code)
        .map(OperationType::ideal_monthly_quota)
        .unwrap_or(0)
}

/// Status spellings that mark an operation as closed.
pub const CLOSED_STATUSES: [&str; 2] = ["CLOSED", "CERRADO"];

/// One operation row. `K` is the key type: `Option<String>` while a row is
/// still unreconciled, `String` once it has a usable `file` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation<K> {
    pub file: K,
    pub client_id: Option<String>,
    pub client: Option<String>,
    pub op_type: Option<String>,
    pub handler: Option<String>,
    pub salesperson: Option<String>,
    pub billing_route: Option<String>,
    pub status: Option<String>,
    pub opened_on: Option<NaiveDate>,
    pub first_invoice_on: Option<NaiveDate>,
    pub arrival_on: Option<NaiveDate>,
    pub departure_on: Option<NaiveDate>,
    pub invoiced_on: Option<NaiveDate>,
    pub closing_sent_on: Option<NaiveDate>,
    pub closed_on: Option<NaiveDate>,
}

/// A row as read from an upload.
pub type UploadRow = Operation<Option<String>>;

/// A row with a reconciled key, as stored.
pub type OperationRecord = Operation<String>;

impl<K> Operation<K> {
    pub fn empty(file: K) -> Self {
        Self {
            file,
            client_id: None,
            client: None,
            op_type: None,
            handler: None,
            salesperson: None,
            billing_route: None,
            status: None,
            opened_on: None,
            first_invoice_on: None,
            arrival_on: None,
            departure_on: None,
            invoiced_on: None,
            closing_sent_on: None,
            closed_on: None,
        }
    }

    /// Same row under a different key.
    pub fn rekey<K2>(self, file: K2) -> Operation<K2> {
        Operation {
            file,
            client_id: self.client_id,
            client: self.client,
            op_type: self.op_type,
            handler: self.handler,
            salesperson: self.salesperson,
            billing_route: self.billing_route,
            status: self.status,
            opened_on: self.opened_on,
            first_invoice_on: self.first_invoice_on,
            arrival_on: self.arrival_on,
            departure_on: self.departure_on,
            invoiced_on: self.invoiced_on,
            closing_sent_on: self.closing_sent_on,
            closed_on: self.closed_on,
        }
    }

    pub fn operation_type(&self) -> Option<OperationType> {
        self.op_type.as_deref().and_then(OperationType::from_code)
    }

    /// Status-based closure, used by the capacity and workload reports.
    pub fn is_closed_status(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| {
                let upper = s.trim().to_uppercase();
                CLOSED_STATUSES.contains(&upper.as_str())
            })
            .unwrap_or(false)
    }

    /// Date-based closure: a closing date has been recorded.
    pub fn is_closed(&self) -> bool {
        self.closed_on.is_some()
    }

    pub fn group_key(&self) -> HandlerType {
        HandlerType {
            handler: self.handler.clone(),
            op_type: self.op_type.clone(),
        }
    }

    pub fn opened_month(&self) -> Option<YearMonth> {
        self.opened_on.map(YearMonth::from_date)
    }
}

/// Grouping key shared by the per-handler, per-type reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerType {
    pub handler: Option<String>,
    pub op_type: Option<String>,
}

impl HandlerType {
    pub fn new(handler: Option<&str>, op_type: Option<&str>) -> Self {
        Self {
            handler: handler.map(str::to_string),
            op_type: op_type.map(str::to_string),
        }
    }
}

/// Calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(s: &str) -> Option<Self> {
        let (y, m) = s.trim().split_once('-')?;
        let year = y.parse().ok()?;
        let month: u32 = m.parse().ok()?;
        (1..=12).contains(&month).then_some(Self { year, month })
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Missing-value share of one important field in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityEntry {
    pub field: String,
    pub missing: u64,
    pub percent: f64,
}

/// Persisted summary of one load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadLogEntry {
    pub loaded_at: DateTime<Utc>,
    pub source: String,
    pub new_records: u64,
    pub existing_records: u64,
    pub internal_duplicates: u64,
    pub discarded_records: u64,
    pub invalid_key_rows: u64,
    pub quality: Vec<QualityEntry>,
}

/// Persisted usage session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub username: String,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub duration_minutes: i64,
    pub pages_visited: Vec<String>,
}
