//! Wire timestamps used in file headers and comment filenames
//!
//! Headers carry `YYYY-MM-DD HH:MM:SS`, always UTC. Parsing reads fixed
//! positions. A component that is not an integer sends the whole timestamp
//! to the UNIX epoch instead of failing the file; integers outside their
//! calendar range roll over into the next unit (`2021-02-30` is March 2nd).

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Header timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Comment file name layout
pub const FILENAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S.md";

/// Parses a header timestamp, returning the epoch on any non-integer component.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    parse_components(s).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn parse_components(s: &str) -> Option<DateTime<Utc>> {
    let field = |start: usize, end: usize| -> Option<i64> { s.get(start..end)?.parse().ok() };

    let year = field(0, 4)?;
    let month = field(5, 7)?;
    let day = field(8, 10)?;
    let hour = field(11, 13)?;
    let minute = field(14, 16)?;
    let second = field(17, 19)?;

    // Months carry into years first, then everything else is an offset from
    // the first of the resulting month.
    let months = year * 12 + (month - 1);
    let first_of_month = Utc
        .with_ymd_and_hms(
            i32::try_from(months.div_euclid(12)).ok()?,
            u32::try_from(months.rem_euclid(12) + 1).ok()?,
            1,
            0,
            0,
            0,
        )
        .single()?;

    let offset = Duration::days(day - 1)
        + Duration::hours(hour)
        + Duration::minutes(minute)
        + Duration::seconds(second);
    first_of_month.checked_add_signed(offset)
}

/// Formats a timestamp the way headers store it.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// File name for a comment submitted at `t`.
pub fn comment_filename(t: &DateTime<Utc>) -> String {
    t.format(FILENAME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_valid_timestamp() {
        let t = parse_timestamp("2020-06-01 13:45:09");
        assert_eq!(t.year(), 2020);
        assert_eq!(t.month(), 6);
        assert_eq!(t.day(), 1);
        assert_eq!(t.hour(), 13);
        assert_eq!(t.minute(), 45);
        assert_eq!(t.second(), 9);
    }

    #[test]
    fn test_malformed_component_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("2020-xx-01 13:45:09"), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(parse_timestamp(""), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_out_of_range_components_roll_over() {
        let at = |y, mo, d, h, mi, s| Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap();

        assert_eq!(parse_timestamp("2021-02-30 00:00:00"), at(2021, 3, 2, 0, 0, 0));
        assert_eq!(parse_timestamp("2020-13-01 00:00:00"), at(2021, 1, 1, 0, 0, 0));
        assert_eq!(parse_timestamp("2020-00-15 00:00:00"), at(2019, 12, 15, 0, 0, 0));
        assert_eq!(parse_timestamp("2020-12-31 24:00:60"), at(2021, 1, 1, 0, 1, 0));
        assert_eq!(parse_timestamp("2020-03-00 00:00:00"), at(2020, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_format_is_zero_padded() {
        let t = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_timestamp(&t), "2021-03-04 05:06:07");
        assert_eq!(comment_filename(&t), "2021-03-04_05-06-07.md");
    }

    #[test]
    fn test_format_then_parse_is_identity() {
        let t = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(&t)), t);
    }
}
