use crate::common::error::{PrismDBError, PrismDBResult};
use crate::types::logical_type::{FieldType, LogicalType, TypeClass};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Temporal value carrying the SQL code it was produced for
/// (DATE, DATETIME or TIMESTAMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Time {
    pub datetime: NaiveDateTime,
    pub is_date: bool,
    pub is_timestamp: bool,
}

impl Time {
    pub fn from_datetime(datetime: NaiveDateTime, logical_type: &LogicalType) -> Self {
        let is_date = *logical_type == LogicalType::Date;
        let datetime = if is_date {
            datetime.date().and_time(NaiveTime::MIN)
        } else {
            datetime
        };
        Self {
            datetime,
            is_date,
            is_timestamp: *logical_type == LogicalType::Timestamp,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_datetime(date.and_time(NaiveTime::MIN), &LogicalType::Date)
    }

    /// Parse `YYYY-MM-DD[ HH:MM:SS[.fraction]]`
    pub fn parse(text: &str, logical_type: &LogicalType) -> PrismDBResult<Self> {
        let text = text.trim();
        let datetime = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT))
            .or_else(|_| {
                NaiveDate::parse_from_str(text, DATE_FORMAT).map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|_| {
                PrismDBError::Cast(format!("Cannot convert '{}' to {}", text, logical_type))
            })?;
        Ok(Self::from_datetime(datetime, logical_type))
    }

    pub fn logical_type(&self) -> LogicalType {
        if self.is_date {
            LogicalType::Date
        } else if self.is_timestamp {
            LogicalType::Timestamp
        } else {
            LogicalType::DateTime
        }
    }

    /// Microseconds since the epoch, used by the value codec
    pub fn to_micros(&self) -> i64 {
        self.datetime.and_utc().timestamp_micros()
    }

    pub fn from_micros(micros: i64, logical_type: &LogicalType) -> PrismDBResult<Self> {
        let datetime = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| PrismDBError::Codec(format!("Time out of range: {}", micros)))?
            .naive_utc();
        Ok(Self::from_datetime(datetime, logical_type))
    }

    /// Numeric form: YYYYMMDD for dates, YYYYMMDDhhmmss otherwise
    pub fn to_number(&self) -> i64 {
        let date = self.datetime.date();
        let day = date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64;
        if self.is_date {
            return day;
        }
        let t = self.datetime.time();
        day * 1_000_000 + (t.hour() * 10_000 + t.minute() * 100 + t.second()) as i64
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_date {
            return write!(f, "{}", self.datetime.format(DATE_FORMAT));
        }
        if self.datetime.nanosecond() == 0 {
            write!(f, "{}", self.datetime.format(DATETIME_FORMAT))
        } else {
            write!(f, "{}", self.datetime.format("%Y-%m-%d %H:%M:%S%.6f"))
        }
    }
}

/// Render a duration as `[-]HH:MM:SS[.ffffff]`
pub fn format_duration(duration: &Duration) -> String {
    let negative = *duration < Duration::zero();
    let sign = if negative { "-" } else { "" };
    let secs = duration.num_seconds().unsigned_abs();
    let frac = duration.subsec_nanos().unsigned_abs() / 1_000;
    let base = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );
    if frac == 0 {
        base
    } else {
        format!("{}.{:06}", base, frac)
    }
}

/// Parse `[-]HH:MM:SS[.ffffff]`
pub fn parse_duration(text: &str) -> PrismDBResult<Duration> {
    let err = || PrismDBError::Cast(format!("Cannot convert '{}' to TIME", text));
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (clock, frac) = match body.split_once('.') {
        Some((clock, frac)) => (clock, frac),
        None => (body, ""),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(err());
    }
    let mut secs: i64 = 0;
    for part in parts {
        let n: i64 = part.parse().map_err(|_| err())?;
        secs = secs
            .checked_mul(60)
            .and_then(|s| s.checked_add(n))
            .ok_or_else(err)?;
    }
    let mut micros = secs.checked_mul(1_000_000).ok_or_else(err)?;
    if !frac.is_empty() {
        let padded = format!("{:0<6}", &frac[..frac.len().min(6)]);
        let fraction = padded.parse::<i64>().map_err(|_| err())?;
        micros = micros.checked_add(fraction).ok_or_else(err)?;
    }
    let micros = if negative {
        micros.checked_neg().ok_or_else(err)?
    } else {
        micros
    };
    Ok(Duration::microseconds(micros))
}

/// A single nullable datum flowing through expression evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Time(Time),
    Duration(Duration),
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Type code a constant holding this value is declared with
    pub fn default_type(&self) -> FieldType {
        match self {
            Value::Null => FieldType::new(LogicalType::Null),
            Value::Int(_) => FieldType::bigint(),
            Value::UInt(_) => FieldType::unsigned_bigint(),
            Value::Double(_) => FieldType::double(),
            Value::Decimal(d) => {
                let scale = d.scale().min(28) as u8;
                FieldType::decimal(28, scale)
            }
            Value::String(_) => FieldType::varchar(),
            Value::Bytes(_) => FieldType::new(LogicalType::Blob),
            Value::Time(t) => FieldType::new(t.logical_type()),
            Value::Duration(_) => FieldType::new(LogicalType::Duration),
            Value::Json(_) => FieldType::json(),
        }
    }

    /// Convert to a signed 64-bit integer following SQL coercion
    pub fn to_i64(&self) -> PrismDBResult<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => Ok(*v as i64),
            Value::Double(v) => float_to_i64(*v),
            Value::Decimal(d) => d
                .round()
                .to_i64()
                .ok_or_else(|| PrismDBError::Overflow(format!("{} out of BIGINT range", d))),
            Value::String(s) => parse_i64(s),
            Value::Bytes(b) => parse_i64(&String::from_utf8_lossy(b)),
            Value::Time(t) => Ok(t.to_number()),
            Value::Duration(d) => Ok(d.num_seconds()),
            Value::Json(j) => match j {
                serde_json::Value::Bool(b) => Ok(*b as i64),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(v) => Ok(v),
                    None => float_to_i64(n.as_f64().unwrap_or_default()),
                },
                serde_json::Value::String(s) => parse_i64(s),
                _ => Ok(0),
            },
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to integer".to_string(),
            )),
        }
    }

    /// Convert to a double following SQL coercion
    pub fn to_f64(&self) -> PrismDBResult<f64> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::UInt(v) => Ok(*v as f64),
            Value::Double(v) => Ok(*v),
            Value::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| PrismDBError::Overflow(format!("{} out of DOUBLE range", d))),
            Value::String(s) => parse_f64(s),
            Value::Bytes(b) => parse_f64(&String::from_utf8_lossy(b)),
            Value::Time(t) => Ok(t.to_number() as f64),
            Value::Duration(d) => Ok(d.num_seconds() as f64 + d.subsec_nanos() as f64 / 1e9),
            Value::Json(j) => match j {
                serde_json::Value::Bool(b) => Ok(*b as i64 as f64),
                serde_json::Value::Number(n) => Ok(n.as_f64().unwrap_or_default()),
                serde_json::Value::String(s) => parse_f64(s),
                _ => Ok(0.0),
            },
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to double".to_string(),
            )),
        }
    }

    /// Convert to a decimal following SQL coercion
    pub fn to_decimal(&self) -> PrismDBResult<Decimal> {
        match self {
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::UInt(v) => Ok(Decimal::from(*v)),
            Value::Double(v) => Decimal::from_f64(*v)
                .ok_or_else(|| PrismDBError::Overflow(format!("{} out of DECIMAL range", v))),
            Value::Decimal(d) => Ok(*d),
            Value::String(s) => Decimal::from_str(s.trim()).map_err(|_| {
                PrismDBError::Cast(format!("Cannot convert '{}' to DECIMAL", s))
            }),
            Value::Json(serde_json::Value::String(s)) => Decimal::from_str(s.trim())
                .map_err(|_| PrismDBError::Cast(format!("Cannot convert '{}' to DECIMAL", s))),
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to decimal".to_string(),
            )),
            other => Value::Double(other.to_f64()?).to_decimal(),
        }
    }

    /// Convert to the plain text form (no quoting)
    pub fn to_text(&self) -> PrismDBResult<String> {
        match self {
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            Value::Double(v) => Ok(v.to_string()),
            Value::Decimal(d) => Ok(d.to_string()),
            Value::String(s) => Ok(s.clone()),
            Value::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
            Value::Time(t) => Ok(t.to_string()),
            Value::Duration(d) => Ok(format_duration(d)),
            Value::Json(j) => serde_json::to_string(j)
                .map_err(|e| PrismDBError::Cast(format!("Cannot render JSON: {}", e))),
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to string".to_string(),
            )),
        }
    }

    /// Convert to a temporal value of the requested code
    pub fn to_time(&self, logical_type: &LogicalType) -> PrismDBResult<Time> {
        match self {
            Value::Time(t) => Ok(Time::from_datetime(t.datetime, logical_type)),
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to time".to_string(),
            )),
            other => Time::parse(&other.to_text()?, logical_type),
        }
    }

    /// Convert to a duration
    pub fn to_duration(&self) -> PrismDBResult<Duration> {
        match self {
            Value::Duration(d) => Ok(*d),
            Value::Int(v) => Duration::try_seconds(*v).ok_or_else(|| {
                PrismDBError::Overflow(format!("{} seconds out of TIME range", v))
            }),
            Value::Time(t) => Ok(Duration::microseconds(
                t.datetime.time().num_seconds_from_midnight() as i64 * 1_000_000,
            )),
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to duration".to_string(),
            )),
            other => parse_duration(&other.to_text()?),
        }
    }

    /// Convert to a JSON document
    pub fn to_json(&self) -> PrismDBResult<serde_json::Value> {
        match self {
            Value::Json(j) => Ok(j.clone()),
            Value::Int(v) => Ok(serde_json::Value::from(*v)),
            Value::UInt(v) => Ok(serde_json::Value::from(*v)),
            Value::Double(v) => Ok(serde_json::Value::from(*v)),
            Value::Decimal(d) => Ok(serde_json::Value::from(d.to_f64().unwrap_or_default())),
            Value::String(s) => serde_json::from_str(s)
                .map_err(|e| PrismDBError::Cast(format!("Invalid JSON text '{}': {}", s, e))),
            Value::Null => Err(PrismDBError::Internal(
                "Cannot convert NULL to JSON".to_string(),
            )),
            other => Ok(serde_json::Value::String(other.to_text()?)),
        }
    }

    /// Convert into the value class described by `tp`
    pub fn convert_to(&self, tp: &FieldType) -> PrismDBResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let value = match tp.type_class() {
            TypeClass::Integer if tp.is_unsigned() => match self {
                Value::UInt(v) => Value::UInt(*v),
                other => Value::UInt(other.to_i64()? as u64),
            },
            TypeClass::Integer => Value::Int(self.to_i64()?),
            TypeClass::Real => Value::Double(self.to_f64()?),
            TypeClass::Decimal => {
                let mut d = self.to_decimal()?;
                if let LogicalType::Decimal { scale, .. } = tp.logical_type {
                    d = d.round_dp(scale as u32);
                }
                Value::Decimal(d)
            }
            TypeClass::Json => Value::Json(self.to_json()?),
            TypeClass::String if tp.logical_type.is_time() => {
                Value::Time(self.to_time(&tp.logical_type)?)
            }
            TypeClass::String if tp.logical_type == LogicalType::Duration => {
                Value::Duration(self.to_duration()?)
            }
            TypeClass::String => match self {
                Value::Bytes(b) if tp.logical_type == LogicalType::Blob => Value::Bytes(b.clone()),
                other => Value::String(other.to_text()?),
            },
        };
        Ok(value)
    }

    /// Compare two non-null values. Numeric values compare across classes,
    /// strings honour `case_insensitive`.
    pub fn compare(&self, other: &Value, case_insensitive: bool) -> PrismDBResult<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::UInt(a), Value::UInt(b)) => Ok(a.cmp(b)),
            (Value::Int(a), Value::UInt(b)) => Ok(compare_int_uint(*a, *b)),
            (Value::UInt(a), Value::Int(b)) => Ok(compare_int_uint(*b, *a).reverse()),
            (Value::Decimal(_), _) | (_, Value::Decimal(_))
                if !matches!(self, Value::Double(_)) && !matches!(other, Value::Double(_)) =>
            {
                Ok(self.to_decimal()?.cmp(&other.to_decimal()?))
            }
            (Value::String(a), Value::String(b)) => Ok(compare_strings(a, b, case_insensitive)),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Ok(a.datetime.cmp(&b.datetime)),
            (Value::Duration(a), Value::Duration(b)) => Ok(a.cmp(b)),
            (Value::Json(a), Value::Json(b)) => {
                let (a, b) = (serde_json::to_string(a), serde_json::to_string(b));
                match (a, b) {
                    (Ok(a), Ok(b)) => Ok(a.cmp(&b)),
                    _ => Err(PrismDBError::Type("Cannot compare JSON values".to_string())),
                }
            }
            (Value::Time(t), Value::String(s)) => {
                let parsed = Time::parse(s, &t.logical_type())?;
                Ok(t.datetime.cmp(&parsed.datetime))
            }
            (Value::String(_), Value::Time(_)) => Ok(other.compare(self, case_insensitive)?.reverse()),
            _ => {
                let (a, b) = (self.to_f64()?, other.to_f64()?);
                a.partial_cmp(&b).ok_or_else(|| {
                    PrismDBError::Type(format!("Cannot compare {} with {}", self, other))
                })
            }
        }
    }
}

/// Compare under a binary or a case-insensitive collation
pub fn compare_strings(a: &str, b: &str, case_insensitive: bool) -> Ordering {
    if case_insensitive {
        a.to_lowercase().cmp(&b.to_lowercase())
    } else {
        a.cmp(b)
    }
}

fn compare_int_uint(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        (a as u64).cmp(&b)
    }
}

fn float_to_i64(v: f64) -> PrismDBResult<i64> {
    let rounded = v.round();
    if rounded.is_nan() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return Err(PrismDBError::Overflow(format!("{} out of BIGINT range", v)));
    }
    Ok(rounded as i64)
}

fn parse_i64(text: &str) -> PrismDBResult<i64> {
    let trimmed = text.trim();
    match trimmed.parse::<i64>() {
        Ok(v) => Ok(v),
        Err(_) => float_to_i64(parse_f64(trimmed)?),
    }
}

fn parse_f64(text: &str) -> PrismDBResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| PrismDBError::Cast(format!("Cannot convert '{}' to number", text)))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(value) => write!(f, "{}", value),
            Value::UInt(value) => write!(f, "{}", value),
            Value::Double(value) => write!(f, "{}", value),
            Value::Decimal(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "'{}'", value),
            Value::Bytes(data) => write!(f, "x'{}'", hex::encode(data)),
            Value::Time(value) => write!(f, "'{}'", value),
            Value::Duration(value) => write!(f, "'{}'", format_duration(value)),
            Value::Json(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Value::Double(2.6).to_i64().unwrap(), 3);
        assert_eq!(Value::string(" 42 ").to_i64().unwrap(), 42);
        assert_eq!(Value::string("4.5").to_i64().unwrap(), 5);
        assert_eq!(Value::Int(7).to_f64().unwrap(), 7.0);
        assert_eq!(
            Value::string("1.25").to_decimal().unwrap(),
            Decimal::new(125, 2)
        );
        assert!(matches!(
            Value::Double(1e30).to_i64(),
            Err(PrismDBError::Overflow(_))
        ));
        assert!(matches!(
            Value::string("abc").to_f64(),
            Err(PrismDBError::Cast(_))
        ));
    }

    #[test]
    fn test_time_round_trip() {
        let t = Time::parse("2024-03-05 10:20:30", &LogicalType::DateTime).unwrap();
        assert_eq!(t.to_string(), "2024-03-05 10:20:30");
        assert_eq!(t.to_number(), 20240305102030);
        let d = Time::parse("2024-03-05 10:20:30", &LogicalType::Date).unwrap();
        assert_eq!(d.to_string(), "2024-03-05");
        let back = Time::from_micros(t.to_micros(), &LogicalType::DateTime).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_duration_text() {
        let d = parse_duration("-01:02:03.5").unwrap();
        assert_eq!(d.num_microseconds(), Some(-(3723 * 1_000_000 + 500_000)));
        assert_eq!(format_duration(&d), "-01:02:03.500000");
        assert!(parse_duration("1:2").is_err());
    }

    #[test]
    fn test_duration_range_is_checked() {
        let err = Value::Int(i64::MAX).to_duration().unwrap_err();
        assert!(matches!(err, PrismDBError::Overflow(_)));
        assert_eq!(Value::Int(90).to_duration().unwrap(), Duration::seconds(90));

        assert!(parse_duration("9223372036854775807:00:00").is_err());
        assert!(parse_duration("2562047788:00:54.9").is_err());

        // Beyond i64 microseconds, rendering and real coercion stay exact
        let max = Duration::MAX;
        assert_eq!(format_duration(&max), "2562047788015:12:55.807000");
        let real = Value::Duration(max).to_f64().unwrap();
        assert!((real - 9_223_372_036_854_775.807).abs() < 1.0);
    }

    #[test]
    fn test_convert_to_unsigned() {
        let v = Value::Int(-1).convert_to(&FieldType::unsigned_bigint()).unwrap();
        assert_eq!(v, Value::UInt(u64::MAX));
    }

    #[test]
    fn test_value_comparison() {
        assert_eq!(
            Value::Int(10).compare(&Value::Int(20), false).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Int(-1).compare(&Value::UInt(1), false).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::string("ABC")
                .compare(&Value::string("abc"), true)
                .unwrap(),
            Ordering::Equal
        );
        assert_ne!(
            Value::string("ABC")
                .compare(&Value::string("abc"), false)
                .unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            Value::Decimal(Decimal::new(15, 1))
                .compare(&Value::Int(1), false)
                .unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::string("x").to_string(), "'x'");
        assert_eq!(Value::Bytes(vec![0xab]).to_string(), "x'ab'");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
