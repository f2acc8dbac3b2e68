
use chrono::{Duration, NaiveDate};

const RECORD_NAME_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a record file name.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format(RECORD_NAME_FORMAT).to_string()
}

/// Inverse of [date_to_record_name]. None for files that are not records.
pub fn record_name_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, RECORD_NAME_FORMAT).ok()
}

/// Formats an elapsed time the way the status line shows it: `01:42`.
/// Seconds are dropped on purpose, the display only refreshes occasionally.
pub fn format_hhmm(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Formats tracked time in hours for statistics output.
pub fn format_hours(duration: Duration) -> String {
    format!("{:.1}h", duration.num_seconds() as f64 / 3600.)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::{date_to_record_name, format_hhmm, format_hours, record_name_to_date};

    #[test]
    fn test_record_name_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        assert_eq!(date_to_record_name(date), "2024-04-05");
        assert_eq!(record_name_to_date("2024-04-05"), Some(date));
        assert_eq!(record_name_to_date("status.txt"), None);
    }

    #[test]
    fn test_format_hhmm() {
        assert_eq!(format_hhmm(Duration::minutes(102)), "01:42");
        assert_eq!(format_hhmm(Duration::seconds(59)), "00:00");
        assert_eq!(format_hhmm(Duration::hours(26)), "26:00");
        assert_eq!(format_hhmm(Duration::seconds(-5)), "00:00");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(Duration::minutes(90)), "1.5h");
        assert_eq!(format_hours(Duration::zero()), "0.0h");
    }
}
