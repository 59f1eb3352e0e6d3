use crate::grid::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use iso8601_duration::Duration as IsoDuration;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Inline string values, including cached formula string results
    InlineString,
    /// Shared string table references
    SharedString,
    /// Formula error results
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Classifies a custom number format code by the date and time tokens
    /// it contains outside of literals, escapes and `[...]` sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// A decoded, not yet typed cell as read from the container.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Raw value as found in the file
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts the raw value into a typed [`CellValue`].
    ///
    /// Values that do not parse as their declared type degrade to text rather
    /// than failing the whole sheet.
    pub(crate) fn to_value(&self) -> CellValue {
        let value = self.value.as_str();
        let typed = match self.kind {
            CellType::Empty => Some(CellValue::Empty),
            CellType::Boolean => Some(CellValue::Bool(value == "1" || value.eq_ignore_ascii_case("true"))),
            CellType::Number => value.parse::<f64>().ok().map(CellValue::Number),
            CellType::NumberDate1900 | CellType::NumberDate1904 => {
                serial_to_datetime(value, self.kind.is_1904()).map(|datetime| CellValue::Date(datetime.date()))
            }
            CellType::NumberTime1900 | CellType::NumberTime1904 => {
                serial_to_datetime(value, self.kind.is_1904()).map(|datetime| CellValue::Time(datetime.time()))
            }
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => {
                serial_to_datetime(value, self.kind.is_1904()).map(CellValue::DateTime)
            }
            CellType::IsoDateTime => parse_iso_datetime(value),
            CellType::IsoDuration => value.parse::<IsoDuration>().ok().and_then(duration_to_time).map(CellValue::Time),
            CellType::InlineString | CellType::SharedString => Some(CellValue::Text(self.value.to_owned())),
            CellType::Error => Some(CellValue::Error(self.value.to_owned())),
        };
        typed.unwrap_or_else(|| {
            tracing::trace!(cell = %self.reference(), value, kind = ?self.kind, "cell value kept as text");
            CellValue::Text(self.value.to_owned())
        })
    }
}

/// Converts an Excel serial number to a date-time.
/// Serials below 60 in the 1900 system are shifted by one day for the Lotus 1-2-3 leap year bug.
fn serial_to_datetime(value: &str, is_1904: bool) -> Option<NaiveDateTime> {
    let serial = value.parse::<f64>().ok().filter(|serial| serial.is_finite() && *serial >= 0.0)?;
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let milliseconds = (serial.fract() * SECONDS_PER_DAY * 1_000.0).round() as i64;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    epoch
        .checked_add_signed(TimeDelta::try_days(days.checked_add(offset)?)?)?
        .checked_add_signed(TimeDelta::try_milliseconds(milliseconds)?)
}

/// Time of day of an ODS `time-value` duration.
/// Durations of a full day or more have no time of day and stay text.
fn duration_to_time(duration: IsoDuration) -> Option<NaiveTime> {
    let seconds = f64::from(duration.day) * SECONDS_PER_DAY
        + f64::from(duration.hour) * 3_600.0
        + f64::from(duration.minute) * 60.0
        + f64::from(duration.second);
    if !(0.0..SECONDS_PER_DAY).contains(&seconds) {
        return None;
    }
    let nanos = (seconds.fract() * 1e9).round().min(999_999_999.0) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds.trunc() as u32, nanos)
}

fn parse_iso_datetime(value: &str) -> Option<CellValue> {
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(CellValue::DateTime)
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(CellValue::Date)
    }
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

    #[test]
    fn custom_formats_classify_dates_and_times() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("hh:mm:ss", true), CellType::NumberTime1904);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", false), CellType::NumberDateTime1900);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("0.0\"days\"", false), CellType::Number);
    }

    #[test]
    fn serial_dates_honor_both_epochs() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(cell(CellType::NumberDate1900, "45306").to_value(), CellValue::Date(date));
        assert_eq!(cell(CellType::NumberDate1904, "43844").to_value(), CellValue::Date(date));
        assert_eq!(
            cell(CellType::NumberDate1900, "1").to_value(),
            CellValue::Date(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
        );
    }

    #[test]
    fn serial_times_and_datetimes() {
        assert_eq!(
            cell(CellType::NumberTime1900, "0.5").to_value(),
            CellValue::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        );
        assert_eq!(
            cell(CellType::NumberDateTime1900, "45306.25").to_value(),
            CellValue::DateTime(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(6, 0, 0).unwrap())
        );
    }

    #[test]
    fn iso_values_and_fallbacks() {
        assert_eq!(
            cell(CellType::IsoDateTime, "2024-03-01").to_value(),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            cell(CellType::IsoDuration, "PT01H30M00S").to_value(),
            CellValue::Time(NaiveTime::from_hms_opt(1, 30, 0).unwrap())
        );
        assert_eq!(cell(CellType::Number, "n/a").to_value(), CellValue::Text("n/a".to_owned()));
        assert_eq!(cell(CellType::Boolean, "1").to_value(), CellValue::Bool(true));
        assert_eq!(cell(CellType::Error, "#DIV/0!").to_value(), CellValue::Error("#DIV/0!".to_owned()));
    }

    #[test]
    fn huge_serials_stay_text() {
        for kind in [CellType::NumberDate1900, CellType::NumberDateTime1904, CellType::NumberTime1900] {
            for value in ["1e15", "1e300", "9.2e18"] {
                assert_eq!(cell(kind, value).to_value(), CellValue::Text(value.to_owned()));
            }
        }
        assert_eq!(
            cell(CellType::NumberDate1900, "2958465").to_value(),
            CellValue::Date(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap())
        );
    }

    #[test]
    fn durations_beyond_a_day_stay_text() {
        for value in ["PT2000000H", "PT24H00M00S", "P1DT1H", "PT99999999999999999999S"] {
            assert_eq!(cell(CellType::IsoDuration, value).to_value(), CellValue::Text(value.to_owned()));
        }
        assert_eq!(
            cell(CellType::IsoDuration, "PT23H59M59S").to_value(),
            CellValue::Time(NaiveTime::from_hms_opt(23, 59, 59).unwrap())
        );
    }
}
