//! Parsing, formatting and calendar arithmetic for dates.

use time::{
    Date, Duration, Month, OffsetDateTime, format_description::BorrowedFormatItem,
    format_description::well_known::Rfc3339, macros::format_description,
};

use crate::Error;

/// The format used for dates in the database and the JSON API, e.g. "2024-03-01".
pub const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Parse a date given as either "YYYY-MM-DD" or an RFC 3339 timestamp.
///
/// Timestamps keep only their date part, the time of day is discarded.
///
/// # Errors
/// Returns an [Error::InvalidDate] if `text` is in neither format or is not a real calendar date.
pub fn parse_date(text: &str) -> Result<Date, Error> {
    let text = text.trim();

    if let Ok(date) = Date::parse(text, DATE_FORMAT) {
        return Ok(date);
    }

    OffsetDateTime::parse(text, &Rfc3339)
        .map(|date_time| date_time.date())
        .map_err(|_| Error::InvalidDate(text.to_owned()))
}

/// Format a date as "YYYY-MM-DD".
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// The number of days in `month` of `year`.
pub fn days_in_month(year: i32, month: Month) -> u8 {
    match month {
        Month::January
        | Month::March
        | Month::May
        | Month::July
        | Month::August
        | Month::October
        | Month::December => 31,
        Month::April | Month::June | Month::September | Month::November => 30,
        Month::February if time::util::is_leap_year(year) => 29,
        Month::February => 28,
    }
}

/// Move `date` by `months` calendar months, clamping the day to the length of the target month.
///
/// For example, one month after 31 January 2024 is 29 February 2024.
/// Returns `None` if the result is outside of the range of representable dates.
pub fn add_months(date: Date, months: i32) -> Option<Date> {
    let month_index = date.year() * 12 + i32::from(u8::from(date.month())) - 1 + months;
    let year = month_index.div_euclid(12);
    let month = Month::try_from((month_index.rem_euclid(12) + 1) as u8).ok()?;
    let day = date.day().min(days_in_month(year, month));

    Date::from_calendar_date(year, month, day).ok()
}

/// The first day of the month that `date` falls in.
pub fn start_of_month(date: Date) -> Date {
    date - Duration::days(i64::from(date.day()) - 1)
}

/// The last day of the month that `date` falls in.
pub fn end_of_month(date: Date) -> Date {
    start_of_month(date) + Duration::days(i64::from(days_in_month(date.year(), date.month())) - 1)
}

/// Serde helpers for writing dates as "YYYY-MM-DD" strings.
///
/// Use with `#[serde(with = "crate::date::iso_date")]` on response types. Request types take
/// optional dates so that a missing date is reported as a missing field, see [option].
pub mod iso_date {
    use serde::Serializer;
    use time::Date;

    use super::format_date;

    /// Serialize a date as "YYYY-MM-DD".
    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_date(*date))
    }

    /// Reads and writes optional dates.
    ///
    /// Use with `#[serde(default, with = "crate::date::iso_date::option")]`.
    /// Deserialization accepts "YYYY-MM-DD" or an RFC 3339 timestamp, see
    /// [parse_date](crate::date::parse_date).
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de};
        use time::Date;

        use crate::date::{format_date, parse_date};

        /// Serialize an optional date as "YYYY-MM-DD" or `null`.
        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_some(&format_date(*date)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional date, `null` is read as `None`.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| parse_date(&text).map_err(de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use time::{Date, macros::date};

    use crate::{
        Error,
        date::{add_months, end_of_month, parse_date, start_of_month},
    };

    #[test]
    fn parses_iso_date() {
        assert_eq!(parse_date("2024-03-01"), Ok(date!(2024 - 03 - 01)));
    }

    #[test]
    fn parses_rfc3339_timestamp() {
        assert_eq!(
            parse_date("2024-03-01T10:30:00.000Z"),
            Ok(date!(2024 - 03 - 01))
        );
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        assert_eq!(
            parse_date("yesterday"),
            Err(Error::InvalidDate("yesterday".to_owned()))
        );
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn add_months_clamps_day() {
        assert_eq!(add_months(date!(2024 - 01 - 31), 1), Some(date!(2024 - 02 - 29)));
        assert_eq!(add_months(date!(2023 - 01 - 31), 1), Some(date!(2023 - 02 - 28)));
        assert_eq!(add_months(date!(2024 - 03 - 15), 1), Some(date!(2024 - 04 - 15)));
    }

    #[test]
    fn add_months_crosses_year_boundaries() {
        assert_eq!(add_months(date!(2024 - 12 - 05), 1), Some(date!(2025 - 01 - 05)));
        assert_eq!(add_months(date!(2024 - 01 - 05), -1), Some(date!(2023 - 12 - 05)));
        assert_eq!(add_months(date!(2024 - 02 - 29), 12), Some(date!(2025 - 02 - 28)));
    }

    #[test]
    fn month_bounds() {
        assert_eq!(start_of_month(date!(2024 - 02 - 17)), date!(2024 - 02 - 01));
        assert_eq!(end_of_month(date!(2024 - 02 - 17)), date!(2024 - 02 - 29));
        assert_eq!(end_of_month(date!(2024 - 12 - 01)), date!(2024 - 12 - 31));
    }

    #[derive(Debug, PartialEq, Serialize)]
    struct Dated {
        #[serde(with = "crate::date::iso_date")]
        date: Date,
        #[serde(with = "crate::date::iso_date::option")]
        end_date: Option<Date>,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct DateInput {
        #[serde(default, with = "crate::date::iso_date::option")]
        date: Option<Date>,
    }

    #[test]
    fn dates_serialize_as_iso_strings() {
        let value = Dated {
            date: date!(2024 - 03 - 01),
            end_date: None,
        };

        let json = serde_json::to_value(&value).unwrap();

        assert_eq!(json, json!({"date": "2024-03-01", "end_date": null}));
    }

    #[test]
    fn optional_dates_accept_iso_strings_and_timestamps() {
        let plain: DateInput = serde_json::from_value(json!({"date": "2024-03-01"})).unwrap();
        let timestamp: DateInput =
            serde_json::from_value(json!({"date": "2024-03-01T10:30:00Z"})).unwrap();

        assert_eq!(plain.date, Some(date!(2024 - 03 - 01)));
        assert_eq!(timestamp, plain);
    }

    #[test]
    fn missing_optional_date_is_none() {
        let value: DateInput = serde_json::from_value(json!({})).unwrap();

        assert_eq!(value.date, None);
    }
}
