#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt;

use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// A scalar cell value.
///
/// Formula cells carry their formula text (with the leading `=`) as a `Text`
/// value; their cached result is tracked separately by the sheet.
///
/// Equality is strict: values of different variants are never equal, so
/// `Number(10.0)` and `Text("10")` differ while `Number(10.0)` equals itself
/// regardless of how the workbook stored it (integer or float).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// No value.
    #[default]
    Empty,
    /// A number.
    Number(f64),
    /// Text, including formula text.
    Text(String),
    /// A boolean.
    Boolean(bool),
    /// A date or date-time.
    Date(NaiveDateTime),
}

impl CellValue {
    /// `true` for `Empty` and for text made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// `true` when the value is formula text.
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.starts_with('='))
    }

    /// Numeric coercion: numbers as-is, booleans as 1/0, text that parses as
    /// a float after trimming, and `None` for everything else.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellValue::Text(text) => f.write_str(text),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Boolean(*b),
            Data::DateTime(dt) => {
                let serial = dt.as_f64();
                from_excel_serial(serial)
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Number(serial))
            }
            Data::DateTimeIso(s) => s
                .parse::<NaiveDateTime>()
                .map(CellValue::Date)
                .unwrap_or_else(|_| CellValue::Text(s.clone())),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

/// Rounds `value` to `digits` decimal places, ties to even.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round_ties_even() / factor
}

/// Day zero of the 1900 date system, accounting for the phantom 1900-02-29.
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts an Excel serial date into a date-time.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    excel_epoch().checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Converts a date-time into an Excel serial date.
pub fn to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - excel_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_strict_across_variants() {
        assert_eq!(CellValue::Number(10.0), CellValue::Number(10.0));
        assert_ne!(CellValue::Number(10.0), CellValue::Text("10".into()));
        assert_ne!(CellValue::Text("Paris".into()), CellValue::Text("paris".into()));
        assert_eq!(CellValue::from(&Data::Int(10)), CellValue::Number(10.0));
    }

    #[test]
    fn blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("  \t".into()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert!(!CellValue::Text("x".into()).is_blank());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(CellValue::Number(2.5).as_number(), Some(2.5));
        assert_eq!(CellValue::Text(" 25 ".into()).as_number(), Some(25.0));
        assert_eq!(CellValue::Text("=SUM(A1:A2)".into()).as_number(), None);
        assert_eq!(CellValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn display_matches_spreadsheet_rendering() {
        assert_eq!(CellValue::Number(10.0).to_string(), "10");
        assert_eq!(CellValue::Number(25.5).to_string(), "25.5");
        assert_eq!(CellValue::Boolean(false).to_string(), "FALSE");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn rounding_removes_float_noise() {
        assert_eq!(round_to(0.1 + 0.2, 5), 0.3);
        assert_eq!(round_to(2.000_004, 5), 2.0);
        assert_eq!(round_to(-1.234_567, 5), -1.23457);
    }

    #[test]
    fn excel_serial_dates() {
        let dt = from_excel_serial(45_292.5).expect("valid serial");
        assert_eq!(dt.to_string(), "2024-01-01 12:00:00");
        assert_eq!(to_excel_serial(&dt), 45_292.5);
    }
}
