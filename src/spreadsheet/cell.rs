use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Timelike;
use iso8601_duration::Duration as IsoDuration;
use std::fmt::Display;

const MICROSECONDS_PER_DAY: f64 = 86_400_000_000f64;

/// Storage type of a raw cell as found in the package, before ingestion.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    Boolean,
    Number,
    /// Serial number formatted as a date or date-time, 1900 date system
    DateTime1900,
    /// Serial number formatted as a date or date-time, 1904 date system
    DateTime1904,
    /// Serial number formatted as a time of day or elapsed time
    Time,
    /// ISO 8601 date or date-time text
    IsoDateTime,
    /// ISO 8601 duration text
    IsoDuration,
    Text,
    /// Index into the xlsx shared string table
    SharedString,
    /// Formula error such as `#N/A`
    Error,
}

impl CellType {
    /// Maps built-in xlsx number format ids to date/time cell types.
    pub(crate) fn from_builtin_number_format(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "22" => Some(Self::serial_date(is_1904)),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::Time),
            _ => None,
        }
    }

    /// Classifies a custom number format code by its date and time tokens.
    /// Quoted literals, escaped characters and bracketed sections such as colours are skipped.
    pub(crate) fn from_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut has_date = false;
        let mut has_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '"' => is_literal = !is_literal,
                _ if is_literal => (),
                '\\' | '_' => is_escaped = true,
                '[' => is_bracket = true,
                ']' => is_bracket = false,
                // elapsed-time sections: [h], [mm], [ss]
                'h' | 'H' | 's' | 'S' if is_bracket => has_time = true,
                _ if is_bracket => (),
                'y' | 'Y' | 'd' | 'D' => has_date = true,
                'h' | 'H' | 's' | 'S' => has_time = true,
                _ => (),
            }
        }
        if has_date {
            Self::serial_date(is_1904)
        } else if has_time {
            Self::Time
        } else {
            Self::Number
        }
    }

    fn serial_date(is_1904: bool) -> Self {
        if is_1904 {
            Self::DateTime1904
        } else {
            Self::DateTime1900
        }
    }
}

/// A raw cell read from a sheet part: position, storage type and unparsed text.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    pub(crate) value: String,
}

impl Cell {
    /// Returns the A1 reference of this cell.
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Types the raw text once, at ingestion.
    pub(crate) fn to_value(&self) -> Result<CellValue, String> {
        let value = match self.kind {
            CellType::Empty | CellType::Error => CellValue::Empty,
            CellType::Boolean => CellValue::Boolean(self.value != "0" && !self.value.eq_ignore_ascii_case("false")),
            CellType::Number => CellValue::Number(self.to_double()?),
            CellType::DateTime1900 | CellType::DateTime1904 => {
                // serials past the calendar keep their number
                let serial = self.to_double()?;
                serial_to_datetime(serial, self.kind == CellType::DateTime1904)
                    .map(CellValue::DateTime)
                    .unwrap_or(CellValue::Number(serial))
            }
            CellType::Time => CellValue::Duration(serial_to_duration(self.to_double()?)),
            CellType::IsoDateTime => CellValue::DateTime(parse_iso_datetime(&self.value)?),
            CellType::IsoDuration => CellValue::Duration(parse_iso_duration(&self.value)?),
            CellType::Text => CellValue::Text(self.value.to_owned()),
            CellType::SharedString => Err(format!("unresolved shared string '{}'", self.value))?,
        };
        Ok(value)
    }

    fn to_double(&self) -> Result<f64, String> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("parse '{}' to number failed", self.value))
    }
}

/// A typed cell value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Duration(Duration),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The value as a column label. Blank cells carry no label.
    pub fn label(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) => Some(text.to_owned()),
            value => Some(value.to_string()),
        }
    }

    /// Integer coercion used by the sequence column.
    ///
    /// Numbers and numeric text are accepted and truncated toward zero; booleans count as 1 and 0.
    /// Dates, durations, blank cells, non-numeric text and non-finite or out-of-range numbers yield `None`.
    pub fn to_sequence_number(&self) -> Option<i64> {
        let number = match self {
            CellValue::Number(number) => *number,
            CellValue::Boolean(flag) => f64::from(u8::from(*flag)),
            CellValue::Text(text) => text.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !number.is_finite() {
            return None;
        }
        let truncated = number.trunc();
        if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
            return None;
        }
        Some(truncated as i64)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(true) => write!(f, "TRUE"),
            CellValue::Boolean(false) => write!(f, "FALSE"),
            CellValue::Number(number) => write!(f, "{}", number),
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::DateTime(datetime) if datetime.time().num_seconds_from_midnight() == 0 && datetime.nanosecond() == 0 => {
                write!(f, "{}", datetime.format("%Y-%m-%d"))
            }
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Duration(duration) => {
                let seconds = duration.num_seconds();
                let sign = if seconds < 0 { "-" } else { "" };
                let seconds = seconds.abs();
                write!(f, "{}{:02}:{:02}:{:02}", sign, seconds / 3600, seconds / 60 % 60, seconds % 60)
            }
        }
    }
}

/// The day before serial 1 in the 1900 date system, accounting for the Lotus 1-2-3 leap year bug.
fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts a spreadsheet serial number to a date-time.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let micros = (serial.fract() * MICROSECONDS_PER_DAY).round() as i64;
    serial_epoch()
        .checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?
        .checked_add_signed(Duration::microseconds(micros))
}

/// Converts a date-time to a 1900 date system serial number.
pub(crate) fn datetime_to_serial(datetime: &NaiveDateTime) -> f64 {
    let elapsed = *datetime - serial_epoch();
    let mut days = elapsed.num_days();
    if days < 61 {
        days -= 1;
    }
    let micros = (elapsed - Duration::days(elapsed.num_days())).num_microseconds().unwrap_or(0);
    days as f64 + micros as f64 / MICROSECONDS_PER_DAY
}

/// Converts a serial day fraction to an elapsed duration.
pub(crate) fn serial_to_duration(serial: f64) -> Duration {
    Duration::microseconds((serial * MICROSECONDS_PER_DAY).round() as i64)
}

/// Converts an elapsed duration to a serial day fraction.
pub(crate) fn duration_to_serial(duration: &Duration) -> f64 {
    match duration.num_microseconds() {
        Some(micros) => micros as f64 / MICROSECONDS_PER_DAY,
        None => duration.num_seconds() as f64 / 86_400f64,
    }
}

fn parse_iso_datetime(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|_| format!("parse '{}' to date-time failed", value))
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| format!("parse '{}' to date failed", value))
    }
}

fn parse_iso_duration(value: &str) -> Result<Duration, String> {
    let duration = value
        .trim()
        .parse::<IsoDuration>()
        .map_err(|_| format!("parse '{}' to iso8601 duration failed", value))?;
    let seconds = f64::from(duration.day) * 86_400f64
        + f64::from(duration.hour) * 3_600f64
        + f64::from(duration.minute) * 60f64
        + f64::from(duration.second);
    Ok(Duration::microseconds((seconds * 1_000_000f64).round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell {
            row: 0,
            col: 0,
            kind,
            value: value.to_owned(),
        }
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn builtin_and_custom_number_formats() {
        assert_eq!(CellType::from_builtin_number_format("14", false), Some(CellType::DateTime1900));
        assert_eq!(CellType::from_builtin_number_format("22", true), Some(CellType::DateTime1904));
        assert_eq!(CellType::from_builtin_number_format("46", false), Some(CellType::Time));
        assert_eq!(CellType::from_builtin_number_format("2", false), None);

        assert_eq!(CellType::from_custom_number_format("yyyy-mm-dd", false), CellType::DateTime1900);
        assert_eq!(CellType::from_custom_number_format("[h]:mm:ss", false), CellType::Time);
        assert_eq!(CellType::from_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::from_custom_number_format("0\" days\"", false), CellType::Number);
    }

    #[test]
    fn ingests_typed_values() {
        assert_eq!(cell(CellType::Number, "5").to_value(), Ok(CellValue::Number(5.0)));
        assert_eq!(cell(CellType::Boolean, "1").to_value(), Ok(CellValue::Boolean(true)));
        assert_eq!(cell(CellType::Error, "#N/A").to_value(), Ok(CellValue::Empty));
        assert_eq!(cell(CellType::Text, " Qty ").to_value(), Ok(CellValue::Text(" Qty ".to_owned())));
        assert_eq!(
            cell(CellType::DateTime1900, "45292.5").to_value(),
            Ok(CellValue::DateTime(datetime(2024, 1, 1, 12, 0, 0)))
        );
        assert_eq!(
            cell(CellType::DateTime1904, "0").to_value(),
            Ok(CellValue::DateTime(datetime(1904, 1, 1, 0, 0, 0)))
        );
        assert_eq!(
            cell(CellType::IsoDateTime, "2024-03-05").to_value(),
            Ok(CellValue::DateTime(datetime(2024, 3, 5, 0, 0, 0)))
        );
        assert_eq!(
            cell(CellType::IsoDuration, "PT12H30M00S").to_value(),
            Ok(CellValue::Duration(Duration::minutes(750)))
        );
        assert!(cell(CellType::Number, "abc").to_value().is_err());
    }

    #[test]
    fn date_serial_past_calendar_keeps_number() {
        assert_eq!(cell(CellType::DateTime1900, "1e12").to_value(), Ok(CellValue::Number(1e12)));
        assert_eq!(cell(CellType::DateTime1904, "-1e15").to_value(), Ok(CellValue::Number(-1e15)));
        assert_eq!(cell(CellType::DateTime1904, "1e300").to_value(), Ok(CellValue::Number(1e300)));
        assert!(cell(CellType::DateTime1900, "soon").to_value().is_err());
    }

    #[test]
    fn lotus_leap_year_serials() {
        assert_eq!(serial_to_datetime(1.0, false), Some(datetime(1900, 1, 1, 0, 0, 0)));
        assert_eq!(serial_to_datetime(59.0, false), Some(datetime(1900, 2, 28, 0, 0, 0)));
        assert_eq!(serial_to_datetime(61.0, false), Some(datetime(1900, 3, 1, 0, 0, 0)));
        assert_eq!(datetime_to_serial(&datetime(1900, 1, 1, 0, 0, 0)), 1.0);
        assert_eq!(datetime_to_serial(&datetime(1900, 3, 1, 0, 0, 0)), 61.0);
        assert_eq!(datetime_to_serial(&datetime(2024, 1, 1, 12, 0, 0)), 45292.5);
    }

    #[test]
    fn sequence_coercion_truncates() {
        assert_eq!(CellValue::Number(3.0).to_sequence_number(), Some(3));
        assert_eq!(CellValue::Number(3.9).to_sequence_number(), Some(3));
        assert_eq!(CellValue::Number(-2.7).to_sequence_number(), Some(-2));
        assert_eq!(CellValue::Text(" 12 ".to_owned()).to_sequence_number(), Some(12));
        assert_eq!(CellValue::Text("4.5".to_owned()).to_sequence_number(), Some(4));
        assert_eq!(CellValue::Boolean(true).to_sequence_number(), Some(1));
    }

    #[test]
    fn sequence_coercion_rejects() {
        assert_eq!(CellValue::Text("x".to_owned()).to_sequence_number(), None);
        assert_eq!(CellValue::Text("".to_owned()).to_sequence_number(), None);
        assert_eq!(CellValue::Text("NaN".to_owned()).to_sequence_number(), None);
        assert_eq!(CellValue::Number(f64::INFINITY).to_sequence_number(), None);
        assert_eq!(CellValue::Number(1e300).to_sequence_number(), None);
        assert_eq!(CellValue::Empty.to_sequence_number(), None);
        assert_eq!(CellValue::DateTime(datetime(2024, 1, 1, 0, 0, 0)).to_sequence_number(), None);
    }

    #[test]
    fn labels() {
        assert_eq!(CellValue::Text("Sr. No.".to_owned()).label(), Some("Sr. No.".to_owned()));
        assert_eq!(CellValue::Number(2024.0).label(), Some("2024".to_owned()));
        assert_eq!(CellValue::Number(1.5).label(), Some("1.5".to_owned()));
        assert_eq!(CellValue::Boolean(false).label(), Some("FALSE".to_owned()));
        assert_eq!(CellValue::DateTime(datetime(2024, 1, 2, 0, 0, 0)).label(), Some("2024-01-02".to_owned()));
        assert_eq!(CellValue::Duration(Duration::seconds(3_725)).label(), Some("01:02:05".to_owned()));
        assert_eq!(CellValue::Empty.label(), None);
    }
}
