use calamine::Data;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::entities::shipment::ShipmentStatus;

/// Day offset between the spreadsheet serial-date epoch (1899-12-30) and the
/// Unix epoch.
const SERIAL_DATE_EPOCH_OFFSET_DAYS: f64 = 25_569.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

static AGING_DAYS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*days?").expect("aging pattern is valid")
});

static SLASH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("date pattern is valid")
});

/// One cell of an input row, tagged by the shape it arrived in.
///
/// Parsing goes through this type rather than poking at raw sheet data so each
/// coercion rule can be tested per field in isolation.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Empty,
}

impl CellValue {
    /// Absent for validation purposes: an empty cell or a blank string.
    pub fn is_absent(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::Date(serial_to_datetime(dt.as_f64(), Utc::now())),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Empty,
        }
    }
}

/// Text fields (identifiers, reason). Numeric cells render without a
/// trailing `.0` so an id typed as a number in the sheet survives intact.
pub fn coerce_text(value: &CellValue) -> String {
    match value {
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        CellValue::Number(n) => format!("{}", n),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Date(d) => d.to_rfc3339(),
        CellValue::Empty => String::new(),
    }
}

/// Aging in days. Recognizes numeric cells, `"<int> day(s)"` strings and
/// plain numeric strings; anything else is 0. Negative input clamps to 0
/// since the field is defined as a non-negative day count.
pub fn coerce_aging(value: &CellValue) -> i32 {
    match value {
        CellValue::Number(n) => (*n as i32).max(0),
        CellValue::Text(s) => {
            if let Some(caps) = AGING_DAYS_RE.captures(s) {
                return caps[1].parse::<i32>().unwrap_or(0).max(0);
            }
            s.trim().parse::<f64>().map(|n| (n as i32).max(0)).unwrap_or(0)
        }
        _ => 0,
    }
}

/// Generic boolean coercion shared by the photos-received and checked fields.
pub fn coerce_bool(value: &CellValue) -> bool {
    match value {
        CellValue::Bool(b) => *b,
        CellValue::Text(s) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1" | "y")
        }
        CellValue::Number(n) => *n == 1.0,
        _ => false,
    }
}

pub fn coerce_photos_received(value: &CellValue) -> bool {
    if let CellValue::Text(s) = value {
        if matches!(s.trim().to_lowercase().as_str(), "received" | "yes" | "true") {
            return true;
        }
    }
    coerce_bool(value)
}

pub fn coerce_checked(value: &CellValue) -> bool {
    if let CellValue::Text(s) = value {
        if matches!(
            s.trim().to_lowercase().as_str(),
            "done" | "completed" | "yes" | "true"
        ) {
            return true;
        }
    }
    coerce_bool(value)
}

/// Status synonym mapping. Canonical wire values map to themselves so an
/// exported sheet re-imports with statuses intact; unmapped input defaults
/// to pending rather than failing the row.
pub fn coerce_status(value: &CellValue) -> ShipmentStatus {
    let raw = match value {
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Bool(b) => b.to_string(),
        _ => return ShipmentStatus::Pending,
    };

    match raw.trim().to_lowercase().as_str() {
        "open in transit" | "in transit" | "in-transit" | "processing" => ShipmentStatus::InTransit,
        "completed" | "closed" | "delivered" => ShipmentStatus::Delivered,
        "cancelled" | "canceled" => ShipmentStatus::Cancelled,
        "delayed" => ShipmentStatus::Delayed,
        _ => ShipmentStatus::Pending,
    }
}

/// Receiving date.
///
/// `None` means the cell held a value that could not be read as a date, which
/// the importer reports as a row error. An absent cell coerces to `now`, so
/// "no date" is indistinguishable from "received today"; the dashboard has
/// always treated undated uploads this way.
pub fn coerce_receiving_date(value: &CellValue, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match value {
        CellValue::Empty => Some(now),
        CellValue::Text(s) if s.trim().is_empty() => Some(now),
        CellValue::Text(s) => parse_date_string(s.trim()),
        // Serial day count from the spreadsheet epoch.
        CellValue::Number(n) => Some(serial_to_datetime(*n, now)),
        CellValue::Date(d) => Some(*d),
        CellValue::Bool(_) => Some(now),
    }
}

/// `MM/DD/YYYY` (month-first) takes precedence; otherwise a few generic
/// date encodings are attempted.
fn parse_date_string(s: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = SLASH_DATE_RE.captures(s) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }

    None
}

fn serial_to_datetime(serial: f64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ((serial - SERIAL_DATE_EPOCH_OFFSET_DAYS) * SECONDS_PER_DAY) as i64;
    DateTime::from_timestamp(secs, 0).unwrap_or(fallback)
}
