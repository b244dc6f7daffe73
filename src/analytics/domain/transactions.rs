use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Formats accepted for sale dates that carry no offset. These are read as
/// UTC.
const NAIVE_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A single product sale from the catalog.
///
/// Transactions are owned by the store. The analytics engine only reads them.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sold: bool,
    /// When the sale happened. This is `None` if the stored value was not a
    /// recognizable timestamp, in which case the transaction never matches a
    /// month filter.
    pub date_of_sale: Option<DateTime<Utc>>,
    pub image: String,
}

/// Parse a sale date as it appears in the catalog.
///
/// # Arguments
/// * `raw_date` - An RFC 3339 timestamp, a timestamp without an offset, or a
///   plain `YYYY-MM-DD` date. Values without an offset are treated as UTC.
///
/// # Returns
///
/// The instant of the sale in UTC, or `None` if the value could not be parsed.
///
/// # Examples
///
/// ```
/// # use sales_analytics_api::analytics::domain::transactions::parse_sale_date;
/// assert!(parse_sale_date("2021-11-27T20:29:54+05:30").is_some());
/// assert!(parse_sale_date("2024-03-05").is_some());
/// assert!(parse_sale_date("last tuesday").is_none());
/// ```
pub fn parse_sale_date(raw_date: &str) -> Option<DateTime<Utc>> {
    let raw_date = raw_date.trim();

    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw_date) {
        return Some(date_time.with_timezone(&Utc));
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw_date, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod test {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn parse_rfc3339_with_offset_converts_to_utc() {
        let parsed = parse_sale_date("2021-11-27T20:29:54+05:30").expect("date should parse");

        assert_eq!(2021, parsed.year());
        assert_eq!(11, parsed.month());
        assert_eq!(27, parsed.day());
        assert_eq!(14, parsed.hour());
        assert_eq!(59, parsed.minute());
    }

    #[test]
    fn parse_offset_can_move_sale_into_previous_month() {
        let parsed = parse_sale_date("2022-03-01T02:00:00+05:30").expect("date should parse");

        assert_eq!(2, parsed.month());
    }

    #[test]
    fn parse_naive_timestamp_as_utc() {
        let parsed = parse_sale_date("2022-07-15 08:30:00").expect("date should parse");

        assert_eq!(7, parsed.month());
        assert_eq!(8, parsed.hour());
    }

    #[test]
    fn parse_naive_timestamp_with_fraction() {
        let parsed = parse_sale_date("2022-07-15T08:30:00.250").expect("date should parse");

        assert_eq!(250_000_000, parsed.nanosecond());
    }

    #[test]
    fn parse_plain_date_as_midnight() {
        let parsed = parse_sale_date(" 2024-03-05 ").expect("date should parse");

        assert_eq!(5, parsed.day());
        assert_eq!(0, parsed.hour());
    }

    #[test]
    fn parse_garbage() {
        assert_eq!(None, parse_sale_date(""));
        assert_eq!(None, parse_sale_date("not a date"));
        assert_eq!(None, parse_sale_date("2024-13-01"));
    }
}
