//! Cell normalization
//!
//! Plain statements run over the MySQL text protocol, so every non-NULL cell
//! comes back as a byte string. Statements with bound parameters run as
//! prepared statements and use the binary protocol, where numbers and
//! temporal values arrive in fixed binary layouts; [`normalize_binary`]
//! handles those and defers to [`normalize`] for everything encoded the same
//! way in both.
//!
//! [`ColumnKind`] decides how the bytes are read and the result is a
//! [`NormalizedValue`]. The mapping is total: bytes that do not fit their
//! kind degrade to text instead of failing the whole row.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bson::{Bson, Document};
use serde_json::{json, Map, Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo};

/// Largest count of significant decimal digits an `f64` round-trips exactly
const F64_DECIMAL_DIGITS: usize = 15;

/// How a column's bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Bit,
    Float,
    Decimal,
    Json,
    Bson,
    /// Bytes of a declared binary column
    Binary,
    /// Blob of unknown declared type; BSON documents are recognized by shape
    Blob,
    /// `DATE`, `DATETIME`, `TIMESTAMP`, `TIME`, `YEAR`
    Temporal,
    Text,
}

impl ColumnKind {
    /// Kind from the driver's type name (e.g. `BIGINT UNSIGNED`, `LONGBLOB`)
    pub fn from_type_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        let base = upper.strip_suffix(" UNSIGNED").unwrap_or(&upper);

        match base {
            "BOOLEAN" | "BOOL" => ColumnKind::Boolean,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => ColumnKind::Integer,
            "BIT" => ColumnKind::Bit,
            "FLOAT" | "DOUBLE" | "REAL" => ColumnKind::Float,
            "DECIMAL" | "NEWDECIMAL" | "NUMERIC" => ColumnKind::Decimal,
            "JSON" => ColumnKind::Json,
            "BSON" => ColumnKind::Bson,
            "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "GEOMETRY" => {
                ColumnKind::Blob
            }
            "DATE" | "DATETIME" | "TIMESTAMP" | "TIME" | "YEAR" => ColumnKind::Temporal,
            _ => ColumnKind::Text,
        }
    }

    /// Kind from an `information_schema.COLUMNS.DATA_TYPE`
    ///
    /// Only types the wire protocol hides behind a generic type are
    /// reported; everything else defers to the driver's type name.
    pub fn from_declared(data_type: &str) -> Option<Self> {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "json" => Some(ColumnKind::Json),
            "bson" => Some(ColumnKind::Bson),
            "tinyblob" | "blob" | "mediumblob" | "longblob" | "binary" | "varbinary" => Some(ColumnKind::Binary),
            _ => None,
        }
    }

    pub fn classify(driver_type: &str, declared: Option<&str>) -> Self {
        declared
            .and_then(Self::from_declared)
            .unwrap_or_else(|| Self::from_type_name(driver_type))
    }
}

/// Wire-safe value of a single cell
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Null,
    Boolean(bool),
    /// Wide enough for both `BIGINT` and `BIGINT UNSIGNED`
    Integer(i128),
    Float(f64),
    String(String),
    /// Base64 on the wire
    Bytes(Vec<u8>),
    Json(Value),
}

impl NormalizedValue {
    /// JSON form of this value
    pub fn to_json(&self) -> Value {
        match self {
            NormalizedValue::Null => Value::Null,
            NormalizedValue::Boolean(b) => Value::Bool(*b),
            NormalizedValue::Integer(i) => integer_to_json(*i),
            NormalizedValue::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            NormalizedValue::String(s) => Value::String(s.clone()),
            NormalizedValue::Bytes(b) => Value::String(BASE64.encode(b)),
            NormalizedValue::Json(v) => v.clone(),
        }
    }
}

fn integer_to_json(i: i128) -> Value {
    if let Ok(v) = i64::try_from(i) {
        Value::from(v)
    } else if let Ok(v) = u64::try_from(i) {
        Value::from(v)
    } else {
        Value::String(i.to_string())
    }
}

/// Normalize one cell
pub fn normalize(value: Option<&[u8]>, kind: ColumnKind) -> NormalizedValue {
    let Some(bytes) = value else {
        return NormalizedValue::Null;
    };

    match kind {
        // TINYINT(1) stores the full tinyint range; any non-zero value is true
        ColumnKind::Boolean => match parse_integer(bytes) {
            Some(n) => NormalizedValue::Boolean(n != 0),
            None => text(bytes),
        },
        ColumnKind::Integer => parse_integer(bytes).map(NormalizedValue::Integer).unwrap_or_else(|| text(bytes)),
        ColumnKind::Bit => {
            if bytes.len() <= 8 {
                let n = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
                NormalizedValue::Integer(i128::from(n))
            } else {
                NormalizedValue::Bytes(bytes.to_vec())
            }
        }
        ColumnKind::Float => match std::str::from_utf8(bytes).ok().and_then(|s| s.trim().parse::<f64>().ok()) {
            Some(f) if f.is_finite() => NormalizedValue::Float(f),
            _ => text(bytes),
        },
        ColumnKind::Decimal => normalize_decimal(bytes),
        ColumnKind::Json => match serde_json::from_slice::<Value>(bytes) {
            Ok(v) => NormalizedValue::Json(v),
            Err(e) => NormalizedValue::Json(json!({
                "$invalid": "json",
                "error": e.to_string(),
                "raw": String::from_utf8_lossy(bytes),
            })),
        },
        ColumnKind::Bson => match bson::from_slice::<Document>(bytes) {
            Ok(doc) => NormalizedValue::Json(document_to_json(doc)),
            Err(e) => NormalizedValue::Json(json!({
                "$invalid": "bson",
                "error": e.to_string(),
                "base64": BASE64.encode(bytes),
            })),
        },
        ColumnKind::Binary => NormalizedValue::Bytes(bytes.to_vec()),
        ColumnKind::Blob => match sniff_bson(bytes) {
            Some(doc) => NormalizedValue::Json(document_to_json(doc)),
            None => NormalizedValue::Bytes(bytes.to_vec()),
        },
        ColumnKind::Temporal | ColumnKind::Text => text(bytes),
    }
}

/// Normalize one cell of a binary-protocol (prepared statement) row
///
/// Integers and floats arrive little-endian at their column width and
/// temporal values as a length-prefixed struct. Strings, decimals and blobs
/// are laid out as in the text protocol.
pub fn normalize_binary(value: Option<&[u8]>, kind: ColumnKind, unsigned: bool) -> NormalizedValue {
    let Some(bytes) = value else {
        return NormalizedValue::Null;
    };

    match kind {
        ColumnKind::Boolean => match binary_integer(bytes, unsigned) {
            Some(n) => NormalizedValue::Boolean(n != 0),
            None => normalize(Some(bytes), kind),
        },
        ColumnKind::Integer => match binary_integer(bytes, unsigned) {
            Some(n) => NormalizedValue::Integer(n),
            None => normalize(Some(bytes), kind),
        },
        ColumnKind::Float => {
            let float = match bytes.len() {
                4 => Some(f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))),
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    Some(f64::from_le_bytes(buf))
                }
                _ => None,
            };
            match float {
                Some(f) if f.is_finite() => NormalizedValue::Float(f),
                _ => normalize(Some(bytes), kind),
            }
        }
        ColumnKind::Temporal => binary_temporal(bytes)
            .map(NormalizedValue::String)
            .unwrap_or_else(|| text(bytes)),
        _ => normalize(Some(bytes), kind),
    }
}

fn binary_integer(bytes: &[u8], unsigned: bool) -> Option<i128> {
    if !matches!(bytes.len(), 1 | 2 | 4 | 8) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    let raw = u64::from_le_bytes(buf);
    if unsigned {
        return Some(i128::from(raw));
    }
    // Sign-extend from the column width
    let shift = 64 - 8 * bytes.len() as u32;
    Some(i128::from(((raw << shift) as i64) >> shift))
}

/// Text form of a binary `DATE`/`DATETIME`/`TIMESTAMP`/`TIME`/`YEAR`
fn binary_temporal(bytes: &[u8]) -> Option<String> {
    // YEAR is a plain two-byte integer
    if bytes.len() == 2 {
        return Some(u16::from_le_bytes([bytes[0], bytes[1]]).to_string());
    }
    // The length byte is part of the cell
    let (&len, body) = bytes.split_first()?;
    if usize::from(len) != body.len() {
        return None;
    }

    let micros = |at: usize| -> Option<String> {
        let raw = body.get(at..at + 4)?;
        let us = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        Some(format!(".{:06}", us))
    };

    match body.len() {
        // Zero date or zero time
        0 => Some(String::new()),
        4 | 7 | 11 => {
            let year = u16::from_le_bytes([body[0], body[1]]);
            let mut out = format!("{:04}-{:02}-{:02}", year, body[2], body[3]);
            if body.len() >= 7 {
                out.push_str(&format!(" {:02}:{:02}:{:02}", body[4], body[5], body[6]));
            }
            if body.len() == 11 {
                out.push_str(&micros(7)?);
            }
            Some(out)
        }
        8 | 12 => {
            let sign = if body[0] == 1 { "-" } else { "" };
            let days = u32::from_le_bytes([body[1], body[2], body[3], body[4]]);
            let hours = days * 24 + u32::from(body[5]);
            let mut out = format!("{}{:02}:{:02}:{:02}", sign, hours, body[6], body[7]);
            if body.len() == 12 {
                out.push_str(&micros(8)?);
            }
            Some(out)
        }
        _ => None,
    }
}

fn text(bytes: &[u8]) -> NormalizedValue {
    NormalizedValue::String(String::from_utf8_lossy(bytes).into_owned())
}

fn parse_integer(bytes: &[u8]) -> Option<i128> {
    std::str::from_utf8(bytes).ok()?.trim().parse::<i128>().ok()
}

fn normalize_decimal(bytes: &[u8]) -> NormalizedValue {
    let Ok(raw) = std::str::from_utf8(bytes) else {
        return text(bytes);
    };
    let raw = raw.trim();

    match significant_digits(raw) {
        Some(digits) if digits <= F64_DECIMAL_DIGITS => match raw.parse::<f64>() {
            Ok(f) => NormalizedValue::Float(f),
            Err(_) => NormalizedValue::String(raw.to_string()),
        },
        _ => NormalizedValue::String(raw.to_string()),
    }
}

/// Significant digits of a plain decimal literal, `None` if it is not one
fn significant_digits(raw: &str) -> Option<usize> {
    let unsigned = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };

    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return None;
    }

    let digits: String = format!("{}{}", int_part, frac_part.trim_end_matches('0'));
    Some(digits.trim_start_matches('0').len())
}

/// Decode `bytes` as BSON only if they are exactly one well-formed document
fn sniff_bson(bytes: &[u8]) -> Option<Document> {
    if bytes.len() < 5 || bytes[bytes.len() - 1] != 0 {
        return None;
    }
    let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if usize::try_from(declared).ok()? != bytes.len() {
        return None;
    }
    bson::from_slice::<Document>(bytes).ok()
}

fn document_to_json(doc: Document) -> Value {
    let mut map = Map::with_capacity(doc.len());
    for (key, value) in doc {
        map.insert(key, bson_to_json(value));
    }
    Value::Object(map)
}

/// Convert a BSON value, labeling types JSON cannot carry
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => match Number::from_f64(f) {
            Some(n) => Value::Number(n),
            None => labeled("double", f.to_string()),
        },
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        Bson::ObjectId(oid) => labeled("objectId", oid.to_hex()),
        Bson::DateTime(dt) => labeled(
            "date",
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        Bson::Binary(bin) => json!({
            "$bson": "binData",
            "subtype": u8::from(bin.subtype),
            "value": BASE64.encode(&bin.bytes),
        }),
        decimal @ Bson::Decimal128(_) => labeled("decimal", decimal.to_string()),
        Bson::Timestamp(ts) => labeled("timestamp", format!("{}:{}", ts.time, ts.increment)),
        Bson::RegularExpression(re) => labeled("regex", format!("/{}/{}", re.pattern, re.options)),
        Bson::JavaScriptCode(code) => labeled("javascript", code),
        Bson::JavaScriptCodeWithScope(code) => labeled("javascriptWithScope", code.code),
        Bson::Symbol(s) => labeled("symbol", s),
        Bson::DbPointer(ptr) => labeled("dbPointer", format!("{:?}", ptr)),
        Bson::MinKey => labeled("minKey", String::new()),
        Bson::MaxKey => labeled("maxKey", String::new()),
        Bson::Undefined => labeled("undefined", String::new()),
    }
}

fn labeled(label: &str, value: String) -> Value {
    json!({ "$bson": label, "value": value })
}

/// Column names and kinds of a row, with optional declared types by column name
pub fn describe_columns<F>(row: &MySqlRow, declared: F) -> (Vec<String>, Vec<ColumnKind>)
where
    F: Fn(&str) -> Option<String>,
{
    row.columns()
        .iter()
        .map(|col| {
            let name = col.name().to_string();
            let kind = ColumnKind::classify(col.type_info().name(), declared(name.as_str()).as_deref());
            (name, kind)
        })
        .unzip()
}

/// Protocol a row was received in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Plain statements
    Text,
    /// Prepared statements with bound parameters
    Binary,
}

/// Normalize every cell of a row
pub fn normalize_row(row: &MySqlRow, kinds: &[ColumnKind], format: WireFormat) -> Vec<NormalizedValue> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| match row.try_get_unchecked::<Option<&[u8]>, _>(i) {
            Ok(bytes) => match format {
                WireFormat::Text => normalize(bytes, *kind),
                WireFormat::Binary => {
                    let unsigned = row
                        .columns()
                        .get(i)
                        .is_some_and(|col| col.type_info().name().ends_with("UNSIGNED"));
                    normalize_binary(bytes, *kind, unsigned)
                }
            },
            Err(e) => NormalizedValue::String(format!("<undecodable: {}>", e)),
        })
        .collect()
}
