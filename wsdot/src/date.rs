//! Date coercion between the services' wire format and `chrono`.
//!
//! The services serialize timestamps with a legacy JSON date literal,
//! `/Date(1700000000000-0800)/`: milliseconds since the Unix epoch (UTC),
//! optionally followed by the server's UTC offset. The offset does not change
//! the instant; it is kept only by [`decode_with_offset`].
//!
//! Some fields arrive as ISO-8601 instead, so [`decode`] accepts both. Every
//! date field goes through this module in both directions; nothing else in
//! the crate parses date strings.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, Utc};
use regex::Regex;

use crate::error::ValidationError;

static DATE_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?Date\((-?\d+)(?:([+-])(\d{2})(\d{2}))?\)/?$").expect("valid date literal regex")
});

/// Parses a date literal or ISO-8601 string into a UTC instant.
///
/// Accepted forms:
///
/// - `/Date(1700000000000)/` and `/Date(1700000000000-0800)/`
/// - RFC 3339 with offset: `2023-11-14T14:13:20-08:00`
/// - naive date-time, taken as UTC: `2023-11-14T22:13:20` (fraction optional)
/// - bare date, midnight UTC: `2023-11-14`
///
/// ## Errors
///
/// Returns [`ValidationError::InvalidDate`] if no form matches or the
/// millisecond count is outside the representable range.
///
/// ## Examples
///
/// ```
/// use wsdot::date::decode;
///
/// let d = decode("/Date(1700000000000-0800)/").unwrap();
/// assert_eq!(d.timestamp_millis(), 1_700_000_000_000);
/// ```
pub fn decode(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    decode_with_offset(value).map(|d| d.with_timezone(&Utc))
}

/// Like [`decode`], but keeps the offset carried by the literal.
///
/// Literals without an offset, naive ISO strings and bare dates come back
/// with a zero offset.
///
/// ## Errors
///
/// Returns [`ValidationError::InvalidDate`] as [`decode`] does.
pub fn decode_with_offset(value: &str) -> Result<DateTime<FixedOffset>, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        value: value.to_string(),
    };
    let trimmed = value.trim();

    if let Some(caps) = DATE_LITERAL.captures(trimmed) {
        let millis: i64 = caps[1].parse().map_err(|_| invalid())?;
        let instant = DateTime::from_timestamp_millis(millis).ok_or_else(invalid)?;

        let offset = match (caps.get(2), caps.get(3), caps.get(4)) {
            (Some(sign), Some(hours), Some(minutes)) => {
                let hours: i32 = hours.as_str().parse().map_err(|_| invalid())?;
                let minutes: i32 = minutes.as_str().parse().map_err(|_| invalid())?;
                let seconds = hours * 3600 + minutes * 60;
                let seconds = if sign.as_str() == "-" { -seconds } else { seconds };
                FixedOffset::east_opt(seconds).ok_or_else(invalid)?
            }
            _ => utc_offset(),
        };

        return Ok(instant.with_timezone(&offset));
    }

    if let Ok(d) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(d);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().fixed_offset());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc().fixed_offset());
    }

    Err(invalid())
}

/// Renders a UTC instant as a date literal without offset.
///
/// `decode(&encode(d)) == d` at millisecond precision.
///
/// ## Examples
///
/// ```
/// use chrono::DateTime;
/// use wsdot::date::{decode, encode};
///
/// let d = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
/// assert_eq!(encode(d), "/Date(1700000000123)/");
/// assert_eq!(decode(&encode(d)).unwrap(), d);
/// ```
pub fn encode(date: DateTime<Utc>) -> String {
    format!("/Date({})/", date.timestamp_millis())
}

/// Renders an instant as a date literal carrying its offset.
pub fn encode_with_offset(date: DateTime<FixedOffset>) -> String {
    let seconds = date.offset().local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!(
        "/Date({}{sign}{:02}{:02})/",
        date.timestamp_millis(),
        minutes / 60,
        minutes % 60
    )
}

/// Renders the canonical RFC 3339 form used inside coerced values.
pub fn to_canonical(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_literal_without_offset() {
        let d = decode("/Date(1700000000000)/").unwrap();
        assert_eq!(d.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn offset_does_not_shift_the_instant() {
        let with = decode("/Date(1700000000000-0800)/").unwrap();
        let without = decode("/Date(1700000000000)/").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn keeps_offset_when_asked() {
        let d = decode_with_offset("/Date(1700000000000-0730)/").unwrap();
        assert_eq!(d.offset().local_minus_utc(), -(7 * 3600 + 30 * 60));
        assert_eq!(encode_with_offset(d), "/Date(1700000000000-0730)/");
    }

    #[test]
    fn decodes_negative_millis() {
        let d = decode("/Date(-86400000)/").unwrap();
        assert_eq!(to_canonical(d), "1969-12-31T00:00:00.000Z");
    }

    #[test]
    fn accepts_literal_without_slashes() {
        assert!(decode("Date(1700000000000)").is_ok());
    }

    #[test]
    fn decodes_rfc3339() {
        let d = decode("2023-11-14T14:13:20-08:00").unwrap();
        assert_eq!(d.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn naive_iso_is_utc() {
        let d = decode("2023-11-14T22:13:20").unwrap();
        assert_eq!(d.timestamp_millis(), 1_700_000_000_000);
        let d = decode("2023-11-14T22:13:20.5").unwrap();
        assert_eq!(d.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        let d = decode("2024-03-01").unwrap();
        assert_eq!(to_canonical(d), "2024-03-01T00:00:00.000Z");
    }

    #[test]
    fn rejects_garbage() {
        for value in ["", "tomorrow", "/Date(abc)/", "/Date(1700000000000-08)/", "2024-13-01"] {
            assert!(
                matches!(decode(value), Err(ValidationError::InvalidDate { .. })),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_millis() {
        assert!(decode("/Date(99999999999999999)/").is_err());
    }

    #[test]
    fn canonical_form_is_decodable() {
        let d = decode("/Date(1700000000123)/").unwrap();
        assert_eq!(to_canonical(d), "2023-11-14T22:13:20.123Z");
        assert_eq!(decode(&to_canonical(d)).unwrap(), d);
    }

    proptest! {
        #[test]
        fn encode_decode_round_trip(millis in -8_000_000_000_000i64..8_000_000_000_000i64) {
            let d = DateTime::from_timestamp_millis(millis).unwrap();
            prop_assert_eq!(decode(&encode(d)).unwrap(), d);
        }

        #[test]
        fn offset_round_trip(
            millis in -8_000_000_000_000i64..8_000_000_000_000i64,
            quarter_hours in -48i32..=56,
        ) {
            let offset = FixedOffset::east_opt(quarter_hours * 15 * 60).unwrap();
            let d = DateTime::from_timestamp_millis(millis).unwrap().with_timezone(&offset);
            prop_assert_eq!(decode_with_offset(&encode_with_offset(d)).unwrap(), d);
        }
    }
}
