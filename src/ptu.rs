//! Planning Time Units: the fixed 30 minute accounting intervals of a day.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

/// Number of PTUs in a calendar day.
pub const PTUS_PER_DAY: usize = 48;

const MINUTES_PER_PTU: u32 = 30;

const WITH_SECONDS: &str = "%Y-%m-%dT%H:%M:%S%.f";
const WITHOUT_SECONDS: &str = "%Y-%m-%dT%H:%M";

/// Returns the index, in `0..48`, of the PTU the given local date-time falls into.
///
/// ```
/// # use chrono::NaiveDate;
/// # use ptu_usage::ptu::bucket_index;
/// let timestamp = NaiveDate::from_ymd_opt(2018, 4, 1).unwrap().and_hms_opt(12, 30, 0).unwrap();
/// assert_eq!(bucket_index(&timestamp), 25);
/// ```
pub fn bucket_index(timestamp: &NaiveDateTime) -> usize {
    let second_half_of_hour = usize::from(timestamp.minute() >= MINUTES_PER_PTU);
    2 * timestamp.hour() as usize + second_half_of_hour
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTimeError {
    /// The input does not have the fixed-width ISO-8601 layout.
    #[error("expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS[.fff]]")]
    Layout,
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
}

/// Parses an ISO-8601 local date-time, with or without seconds and fractional seconds.
/// Offsets, zone designators, signed or short fields and leap seconds are rejected.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, ParseTimeError> {
    let bytes = input.as_bytes();
    if bytes.len() < 16 || !is_date_layout(&bytes[..10]) || !matches_layout(&bytes[10..16], b"T##:##") {
        return Err(ParseTimeError::Layout);
    }

    if bytes.len() == 16 {
        return Ok(NaiveDateTime::parse_from_str(input, WITHOUT_SECONDS)?);
    }

    // Seconds are 00 to 59, an optional fraction follows a dot.
    let seconds_ok = bytes.len() >= 19 && matches_layout(&bytes[16..19], b":##") && bytes[17] <= b'5';
    let fraction_ok = match &bytes[19.min(bytes.len())..] {
        [] => true,
        [b'.', digits @ ..] => (1..=9).contains(&digits.len()) && digits.iter().all(u8::is_ascii_digit),
        _ => false,
    };
    if !seconds_ok || !fraction_ok {
        return Err(ParseTimeError::Layout);
    }

    Ok(NaiveDateTime::parse_from_str(input, WITH_SECONDS)?)
}

/// Parses an ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(input: &str) -> Result<NaiveDate, ParseTimeError> {
    if !is_date_layout(input.as_bytes()) {
        return Err(ParseTimeError::Layout);
    }

    Ok(NaiveDate::parse_from_str(input, "%Y-%m-%d")?)
}

fn is_date_layout(bytes: &[u8]) -> bool {
    matches_layout(bytes, b"####-##-##")
}

/// `#` stands for an ASCII digit, any other byte must match exactly.
fn matches_layout(bytes: &[u8], layout: &[u8]) -> bool {
    bytes.len() == layout.len()
        && bytes
            .iter()
            .zip(layout)
            .all(|(byte, expected)| match expected {
                b'#' => byte.is_ascii_digit(),
                _ => byte == expected,
            })
}

/// Serde representation of a local date-time as an ISO-8601 string, the way it appears on the wire.
///
/// Seconds are always written, fractional seconds only when present. Reading accepts everything
/// [`parse_timestamp`] accepts.
pub mod local_date_time {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&timestamp.format(super::WITH_SECONDS))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let input = String::deserialize(deserializer)?;
        super::parse_timestamp(&input).map_err(|error| de::Error::custom(format!("{}: {}", error, input)))
    }
}
