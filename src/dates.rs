//! Calendar-date helpers shared by goals, meals and reports.
//!
//! Everything in this service compares at day granularity. Timestamps that
//! arrive over the wire are truncated here, at the boundary, and nowhere else.

use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, Duration,
    OffsetDateTime, PrimitiveDateTime,
};

use crate::error::{AppError, AppResult};

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::validation("Invalid date format. Use Y-m-d."))
}

/// Parses either a plain date or a timestamp and keeps only the calendar day.
pub fn parse_day(raw: &str) -> Result<Date, AppError> {
    let raw = raw.trim();
    if let Ok(date) = parse_date(raw) {
        return Ok(date);
    }
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts.date());
    }
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .map(|dt| dt.date())
    .map_err(|_| AppError::validation("Invalid date format. Use Y-m-d."))
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Fails instead of wrapping past the calendar range `time` supports.
pub fn add_days(date: Date, days: i64) -> AppResult<Date> {
    date.checked_add(Duration::days(days))
        .ok_or_else(|| AppError::validation("Date out of range"))
}

pub fn monday_of(date: Date) -> AppResult<Date> {
    add_days(date, -i64::from(date.weekday().number_days_from_monday()))
}

pub fn is_monday(date: Date) -> bool {
    date.weekday().number_days_from_monday() == 0
}

/// serde adapter for `YYYY-MM-DD` dates.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::Serializer;
        use time::Date;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => s.serialize_str(&super::super::format_date(*d)),
                None => s.serialize_none(),
            }
        }
    }
}

/// Lets a PATCH-style body tell "field absent" apart from "field: null".
pub fn deserialize_some<'de, T, D>(d: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(d).map(Some)
}

/// Query-string flag in the lenient form clients tend to send.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "on" | "yes")
    )
}
