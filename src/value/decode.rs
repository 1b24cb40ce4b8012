//! Typed decode from native driver values
//!
//! The change stream is read over the text protocol, so most values arrive
//! as raw bytes; binary-protocol variants are accepted as well.

use super::types::{DataType, Value};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use mysql_async::Value as Native;
use std::borrow::Cow;

/// Decode one native value as the given canonical kind.
///
/// SQL NULL decodes to [`Value::Null`] whatever the kind.
pub fn decode_value(column: &str, kind: DataType, raw: &Native) -> Result<Value> {
    if matches!(raw, Native::NULL) {
        return Ok(Value::Null);
    }

    let fail = |message: String| Error::decode(column, message);

    match kind {
        DataType::Bool => match raw {
            Native::Int(n) => Ok(Value::Bool(*n != 0)),
            Native::UInt(n) => Ok(Value::Bool(*n != 0)),
            _ => {
                let text = text(raw);
                match text.trim() {
                    t if t.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                    t if t.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                    t => t
                        .parse::<i64>()
                        .map(|n| Value::Bool(n != 0))
                        .map_err(|e| fail(format!("'{t}' is not a boolean: {e}"))),
                }
            }
        },
        DataType::Short => integer(raw, &fail).and_then(|n| {
            i16::try_from(n)
                .map(Value::Short)
                .map_err(|_| fail(format!("{n} out of range for SHORT")))
        }),
        DataType::Int => integer(raw, &fail).and_then(|n| {
            i32::try_from(n)
                .map(Value::Int)
                .map_err(|_| fail(format!("{n} out of range for INT")))
        }),
        DataType::Long => integer(raw, &fail).map(Value::Long),
        DataType::Float => match raw {
            Native::Float(f) => Ok(Value::Float(*f)),
            Native::Double(d) => Ok(Value::Float(*d as f32)),
            _ => {
                let text = text(raw);
                text.trim()
                    .parse::<f32>()
                    .map(Value::Float)
                    .map_err(|e| fail(format!("'{text}' is not a float: {e}")))
            }
        },
        DataType::Double => match raw {
            Native::Float(f) => Ok(Value::Double(f64::from(*f))),
            Native::Double(d) => Ok(Value::Double(*d)),
            _ => {
                let text = text(raw);
                text.trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|e| fail(format!("'{text}' is not a double: {e}")))
            }
        },
        DataType::Decimal => Ok(Value::Decimal(text(raw).into_owned())),
        DataType::Date => match raw {
            Native::Date(0, 0, 0, ..) => Ok(Value::Null),
            Native::Date(y, m, d, ..) => NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*m), u32::from(*d))
                .map(Value::Date)
                .ok_or_else(|| fail(format!("invalid date {y}-{m}-{d}"))),
            _ => parse_date(&text(raw)).map_err(fail),
        },
        DataType::DateTime => match raw {
            Native::Date(0, 0, 0, ..) => Ok(Value::Null),
            Native::Date(y, mo, d, h, mi, s, us) => {
                NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*mo), u32::from(*d))
                    .and_then(|date| {
                        date.and_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us)
                    })
                    .map(|dt| Value::DateTime(dt.and_utc()))
                    .ok_or_else(|| fail(format!("invalid datetime {y}-{mo}-{d} {h}:{mi}:{s}")))
            }
            Native::Time(neg, days, h, m, s, us) => {
                let micros = ((i64::from(*days) * 24 + i64::from(*h)) * 3600
                    + i64::from(*m) * 60
                    + i64::from(*s))
                    * 1_000_000
                    + i64::from(*us);
                Ok(Value::DateTime(from_epoch_micros(if *neg { -micros } else { micros })))
            }
            _ => parse_date_time(&text(raw)).map_err(fail),
        },
        DataType::Binary => Ok(Value::Binary(match raw {
            Native::Bytes(b) => b.clone(),
            other => text(other).into_owned().into_bytes(),
        })),
        DataType::Json => Ok(Value::Json(text(raw).into_owned())),
        DataType::String | DataType::Unspecified => Ok(Value::String(text(raw).into_owned())),
    }
}

/// Text form of a native value, lossy for invalid UTF-8
fn text(raw: &Native) -> Cow<'_, str> {
    match raw {
        Native::NULL => Cow::Borrowed(""),
        Native::Bytes(b) => String::from_utf8_lossy(b),
        Native::Int(n) => Cow::Owned(n.to_string()),
        Native::UInt(n) => Cow::Owned(n.to_string()),
        Native::Float(f) => Cow::Owned(f.to_string()),
        Native::Double(d) => Cow::Owned(d.to_string()),
        // Binary-protocol temporal values are not produced by the text stream
        Native::Date(..) | Native::Time(..) => Cow::Owned(raw.as_sql(true).trim_matches('\'').to_string()),
    }
}

fn integer(raw: &Native, fail: &impl Fn(String) -> Error) -> Result<i64> {
    match raw {
        Native::Int(n) => Ok(*n),
        Native::UInt(n) => i64::try_from(*n).map_err(|_| fail(format!("{n} out of range"))),
        _ => {
            let text = text(raw);
            text.trim()
                .parse::<i64>()
                .map_err(|e| fail(format!("'{text}' is not an integer: {e}")))
        }
    }
}

/// `0000-00-00` dates and the zero `YEAR` value `0000`
fn is_zero_date(text: &str) -> bool {
    text == "0000" || text.starts_with("0000-00-00")
}

fn parse_date(text: &str) -> std::result::Result<Value, String> {
    let text = text.trim();
    if is_zero_date(text) {
        return Ok(Value::Null);
    }
    // YEAR columns arrive as a bare year
    if text.len() == 4 {
        return text
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
            .map(Value::Date)
            .ok_or_else(|| format!("'{text}' is not a year"));
    }
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|e| format!("'{text}' is not a date: {e}"))
}

fn parse_date_time(text: &str) -> std::result::Result<Value, String> {
    let text = text.trim();
    if is_zero_date(text) {
        return Ok(Value::Null);
    }
    if text.as_bytes().get(4) == Some(&b'-') {
        if text.len() == 10 {
            return NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| Value::DateTime(d.and_time(NaiveTime::MIN).and_utc()))
                .map_err(|e| format!("'{text}' is not a date: {e}"));
        }
        return NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map(|dt| Value::DateTime(dt.and_utc()))
            .map_err(|e| format!("'{text}' is not a datetime: {e}"));
    }
    parse_time(text)
        .map(|micros| Value::DateTime(from_epoch_micros(micros)))
        .ok_or_else(|| format!("'{text}' is not a time"))
}

/// Parse `[-]H+:MM:SS[.ffffff]` into signed microseconds
fn parse_time(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (clock, fraction) = match body.split_once('.') {
        Some((clock, fraction)) => (clock, fraction),
        None => (body, ""),
    };
    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }
    let micros = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(6).collect();
        digits.parse::<i64>().ok()?
    };
    let total = (hours * 3600 + minutes * 60 + seconds) * 1_000_000 + micros;
    Some(if negative { -total } else { total })
}

fn from_epoch_micros(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::microseconds(micros)
}
