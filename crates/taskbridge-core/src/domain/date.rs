//! Wire date format: `YYYY-MM-DDTHH:mm:ss.sssZ`, used on input and output.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

/// chrono format string for producing wire dates.
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A literal that satisfies the wire format, quoted in error messages.
pub const WIRE_EXAMPLE: &str = "2025-10-30T04:05:22.422Z";

pub fn format_wire(value: &DateTime<Utc>) -> String {
    value.format(WIRE_FORMAT).to_string()
}

/// Calendar-checking parse. Callers must check the shape first
/// (see `app::guard::validate_date`); chrono alone is lenient about
/// the number of fractional digits. Second `60` is rejected: chrono
/// reads it as a leap second at any minute.
pub(crate) fn parse_wire_lenient(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()
        .filter(|naive| naive.nanosecond() < 1_000_000_000)
        .map(|naive| naive.and_utc())
}

/// serde adapter for `Option<DateTime<Utc>>` fields in wire format.
pub mod wire_option {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format_wire(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse_wire_lenient(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_exactly_three_fraction_digits() {
        let t = Utc.with_ymd_and_hms(2025, 10, 30, 4, 5, 22).unwrap();
        assert_eq!(format_wire(&t), "2025-10-30T04:05:22.000Z");
    }

    #[test]
    fn example_parses() {
        let t = parse_wire_lenient(WIRE_EXAMPLE).unwrap();
        assert_eq!(format_wire(&t), WIRE_EXAMPLE);
    }

    #[test]
    fn second_sixty_is_not_a_real_instant() {
        assert_eq!(parse_wire_lenient("2025-10-30T04:05:60.000Z"), None);
        assert_eq!(parse_wire_lenient("2016-12-31T23:59:60.000Z"), None);
    }
}
