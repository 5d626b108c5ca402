//! Order-preserving, type-tagged binary encoding of values.
//!
//! Every encoded value starts with a one byte flag followed by a payload
//! whose byte order matches the value order within that flag. Variable
//! length payloads use the 8-byte group encoding, so encodings are
//! self-delimiting and can be concatenated and nested without ambiguity.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::types::logical_type::LogicalType;
use crate::types::value::{Time, Value};
use byteorder::{BigEndian, ByteOrder};
use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

const NIL_FLAG: u8 = 0;
const BYTES_FLAG: u8 = 1;
const STRING_FLAG: u8 = 2;
const INT_FLAG: u8 = 3;
const UINT_FLAG: u8 = 4;
const FLOAT_FLAG: u8 = 5;
const DECIMAL_FLAG: u8 = 6;
const DURATION_FLAG: u8 = 7;
const TIME_FLAG: u8 = 8;
const JSON_FLAG: u8 = 9;

const SIGN_MASK: u64 = 0x8000_0000_0000_0000;
const GROUP_SIZE: usize = 8;
const MARKER: u8 = 0xFF;
const PAD: u8 = 0x00;

/// Append the encoding of every value to `out`. Every value has an
/// encoding, so this cannot fail.
pub fn encode_value(out: &mut Vec<u8>, values: &[Value]) {
    for value in values {
        encode_one(out, value);
    }
}

/// Encode `values` into a fresh buffer
pub fn encode_to_vec(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value(&mut out, values);
    out
}

fn encode_one(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(NIL_FLAG),
        Value::Int(v) => {
            out.push(INT_FLAG);
            encode_int(out, *v);
        }
        Value::UInt(v) => {
            out.push(UINT_FLAG);
            encode_u64(out, *v);
        }
        Value::Double(v) => {
            out.push(FLOAT_FLAG);
            encode_float(out, *v);
        }
        Value::Decimal(d) => {
            // Float prefix keeps numeric order, the exact text keeps it lossless.
            let normalized = d.normalize();
            out.push(DECIMAL_FLAG);
            encode_float(out, normalized.to_f64().unwrap_or(0.0));
            encode_bytes(out, normalized.to_string().as_bytes());
        }
        Value::String(s) => {
            out.push(STRING_FLAG);
            encode_bytes(out, s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(BYTES_FLAG);
            encode_bytes(out, b);
        }
        Value::Time(t) => {
            out.push(TIME_FLAG);
            out.push(time_code(&t.logical_type()));
            encode_int(out, t.to_micros());
        }
        Value::Duration(d) => {
            // Seconds truncate toward zero and the subsecond part carries the
            // duration's sign, so the pair orders like the duration.
            out.push(DURATION_FLAG);
            encode_int(out, d.num_seconds());
            encode_int(out, d.subsec_nanos() as i64);
        }
        Value::Json(j) => {
            out.push(JSON_FLAG);
            encode_bytes(out, j.to_string().as_bytes());
        }
    }
}

/// Decode every value in `buf`
pub fn decode_value(mut buf: &[u8]) -> PrismDBResult<Vec<Value>> {
    let mut values = Vec::new();
    while !buf.is_empty() {
        let (value, rest) = decode_one(buf)?;
        values.push(value);
        buf = rest;
    }
    Ok(values)
}

fn decode_one(buf: &[u8]) -> PrismDBResult<(Value, &[u8])> {
    let flag = buf[0];
    let buf = &buf[1..];
    match flag {
        NIL_FLAG => Ok((Value::Null, buf)),
        INT_FLAG => {
            let (v, rest) = decode_int(buf)?;
            Ok((Value::Int(v), rest))
        }
        UINT_FLAG => {
            let (v, rest) = decode_u64(buf)?;
            Ok((Value::UInt(v), rest))
        }
        FLOAT_FLAG => {
            let (v, rest) = decode_float(buf)?;
            Ok((Value::Double(v), rest))
        }
        DECIMAL_FLAG => {
            let (_, rest) = decode_float(buf)?;
            let (text, rest) = decode_bytes(rest)?;
            let text = utf8(text)?;
            let d = Decimal::from_str(&text)
                .map_err(|e| PrismDBError::Codec(format!("Invalid decimal '{}': {}", text, e)))?;
            Ok((Value::Decimal(d), rest))
        }
        STRING_FLAG => {
            let (bytes, rest) = decode_bytes(buf)?;
            Ok((Value::String(utf8(bytes)?), rest))
        }
        BYTES_FLAG => {
            let (bytes, rest) = decode_bytes(buf)?;
            Ok((Value::Bytes(bytes), rest))
        }
        TIME_FLAG => {
            let code = *buf
                .first()
                .ok_or_else(|| PrismDBError::Codec("Truncated time".to_string()))?;
            let (micros, rest) = decode_int(&buf[1..])?;
            let time = Time::from_micros(micros, &time_type(code)?)?;
            Ok((Value::Time(time), rest))
        }
        DURATION_FLAG => {
            let (secs, rest) = decode_int(buf)?;
            let (nanos, rest) = decode_int(rest)?;
            let duration = Duration::try_seconds(secs)
                .and_then(|d| d.checked_add(&Duration::nanoseconds(nanos)))
                .ok_or_else(|| {
                    PrismDBError::Codec(format!("Duration out of range: {}s {}ns", secs, nanos))
                })?;
            Ok((Value::Duration(duration), rest))
        }
        JSON_FLAG => {
            let (bytes, rest) = decode_bytes(buf)?;
            let json = serde_json::from_slice(&bytes)
                .map_err(|e| PrismDBError::Codec(format!("Invalid JSON: {}", e)))?;
            Ok((Value::Json(json), rest))
        }
        other => Err(PrismDBError::Codec(format!("Unknown value flag {}", other))),
    }
}

fn time_code(logical_type: &LogicalType) -> u8 {
    match logical_type {
        LogicalType::Date => 0,
        LogicalType::Timestamp => 2,
        _ => 1,
    }
}

fn time_type(code: u8) -> PrismDBResult<LogicalType> {
    match code {
        0 => Ok(LogicalType::Date),
        1 => Ok(LogicalType::DateTime),
        2 => Ok(LogicalType::Timestamp),
        other => Err(PrismDBError::Codec(format!("Unknown time code {}", other))),
    }
}

fn utf8(bytes: Vec<u8>) -> PrismDBResult<String> {
    String::from_utf8(bytes).map_err(|e| PrismDBError::Codec(format!("Invalid UTF-8: {}", e)))
}

fn encode_u64(out: &mut Vec<u8>, v: u64) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, v);
    out.extend_from_slice(&buf);
}

fn encode_int(out: &mut Vec<u8>, v: i64) {
    encode_u64(out, (v as u64) ^ SIGN_MASK);
}

fn encode_float(out: &mut Vec<u8>, v: f64) {
    let bits = v.to_bits();
    let ordered = if v >= 0.0 { bits | SIGN_MASK } else { !bits };
    encode_u64(out, ordered);
}

fn decode_u64(buf: &[u8]) -> PrismDBResult<(u64, &[u8])> {
    if buf.len() < 8 {
        return Err(PrismDBError::Codec(format!(
            "Need 8 bytes to decode an integer, got {}",
            buf.len()
        )));
    }
    Ok((BigEndian::read_u64(&buf[..8]), &buf[8..]))
}

fn decode_int(buf: &[u8]) -> PrismDBResult<(i64, &[u8])> {
    let (u, rest) = decode_u64(buf)?;
    Ok(((u ^ SIGN_MASK) as i64, rest))
}

fn decode_float(buf: &[u8]) -> PrismDBResult<(f64, &[u8])> {
    let (u, rest) = decode_u64(buf)?;
    let bits = if u & SIGN_MASK > 0 { u & !SIGN_MASK } else { !u };
    Ok((f64::from_bits(bits), rest))
}

/// Group encoding: every 8 data bytes are followed by a marker byte equal
/// to 0xFF minus the number of padding bytes in that group.
fn encode_bytes(out: &mut Vec<u8>, data: &[u8]) {
    for chunk_start in (0..=data.len()).step_by(GROUP_SIZE) {
        let remain = data.len() - chunk_start;
        if remain >= GROUP_SIZE {
            out.extend_from_slice(&data[chunk_start..chunk_start + GROUP_SIZE]);
            out.push(MARKER);
        } else {
            let pad = GROUP_SIZE - remain;
            out.extend_from_slice(&data[chunk_start..]);
            out.extend(std::iter::repeat(PAD).take(pad));
            out.push(MARKER - pad as u8);
        }
    }
}

fn decode_bytes(buf: &[u8]) -> PrismDBResult<(Vec<u8>, &[u8])> {
    let mut data = Vec::new();
    let mut offset = 0;
    loop {
        if buf.len() < offset + GROUP_SIZE + 1 {
            return Err(PrismDBError::Codec("Truncated byte group".to_string()));
        }
        let group = &buf[offset..offset + GROUP_SIZE];
        let marker = buf[offset + GROUP_SIZE];
        offset += GROUP_SIZE + 1;
        let pad = (MARKER - marker) as usize;
        if pad == 0 {
            data.extend_from_slice(group);
            continue;
        }
        if pad > GROUP_SIZE {
            return Err(PrismDBError::Codec(format!("Invalid group marker {}", marker)));
        }
        data.extend_from_slice(&group[..GROUP_SIZE - pad]);
        return Ok((data, &buf[offset..]));
    }
}
