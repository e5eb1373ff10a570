//! Row decoding for relational result sets.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the driver's column type name
//! 2. Store-specific decoders extract the value as JSON
//!
//! Queries run over the text protocol, so every decoder also accepts the
//! value in its textual form.

use crate::models::StoreKind;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, store: StoreKind) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if store == StoreKind::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // SQLite stores temporal values as text; leave them to the text decoder
    if store != StoreKind::SQLite {
        match lower.as_str() {
            "date" => return TypeCategory::Date,
            "time" => return TypeCategory::Time,
            "timestamptz" => return TypeCategory::TimestampTz,
            "datetime" | "timestamp" => return TypeCategory::Timestamp,
            _ => {}
        }
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw DECIMAL/NUMERIC value, kept in the database's textual form.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Decimal text as a JSON number when it fits an f64 exactly enough, else a string.
fn decimal_value(text: String) -> JsonValue {
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && text.len() <= 15)
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::String(text))
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Binary data as JSON: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Non-null value of `T` at `idx`, if it decodes.
fn optional<R, T>(row: &R, idx: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: for<'r> Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

fn boolean_column<R>(row: &R, idx: usize) -> JsonValue
where
    R: Row,
    usize: ColumnIndex<R>,
    bool: for<'r> Decode<'r, R::Database> + Type<R::Database>,
{
    optional::<R, bool>(row, idx)
        .map(JsonValue::Bool)
        .unwrap_or(JsonValue::Null)
}

fn binary_column<R>(row: &R, idx: usize) -> JsonValue
where
    R: Row,
    usize: ColumnIndex<R>,
    Vec<u8>: for<'r> Decode<'r, R::Database> + Type<R::Database>,
{
    optional::<R, Vec<u8>>(row, idx)
        .map(|bytes| decode_binary_value(&bytes))
        .unwrap_or(JsonValue::Null)
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Converts a driver row into a record keyed by column name.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
    fn column_names(&self) -> Vec<String>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $store:expr, $decoder:path) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let type_name = col.type_info().name();
                        let category = categorize_type(type_name, $store);
                        (col.name().to_string(), $decoder(self, idx, category))
                    })
                    .collect()
            }

            fn column_names(&self) -> Vec<String> {
                self.columns().iter().map(|c| c.name().to_string()).collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, StoreKind::MySql, mysql::decode_column);
impl_row_to_json!(PgRow, StoreKind::Postgres, postgres::decode_column);
impl_row_to_json!(SqliteRow, StoreKind::SQLite, sqlite::decode_column);

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => boolean_column(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => binary_column(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Date => decode_temporal::<NaiveDate>(row, idx),
            TypeCategory::Time => decode_temporal::<NaiveTime>(row, idx),
            TypeCategory::Timestamp | TypeCategory::TimestampTz => {
                decode_temporal::<NaiveDateTime>(row, idx)
            }
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => decimal_value(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        decode_text(row, idx)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<JsonValue>, _>(idx) {
            return v;
        }
        match decode_text(row, idx) {
            JsonValue::String(s) => serde_json::from_str(&s).unwrap_or(JsonValue::String(s)),
            other => other,
        }
    }

    fn decode_temporal<T>(row: &MySqlRow, idx: usize) -> JsonValue
    where
        T: for<'r> Decode<'r, sqlx::MySql> + Type<sqlx::MySql> + ToString,
    {
        match row.try_get::<Option<T>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.to_string()),
            Ok(None) => JsonValue::Null,
            // Zero dates and out-of-range values fall back to the raw text
            Err(_) => decode_text(row, idx),
        }
    }

    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(v);
        }
        row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|bytes| decode_binary_value(&bytes))
            .unwrap_or(JsonValue::Null)
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => boolean_column(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => binary_column(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Date => decode_temporal::<NaiveDate>(row, idx),
            TypeCategory::Time => decode_temporal::<NaiveTime>(row, idx),
            TypeCategory::Timestamp => decode_temporal::<NaiveDateTime>(row, idx),
            TypeCategory::TimestampTz => match row.try_get::<Option<DateTime<Utc>>, _>(idx) {
                Ok(Some(v)) => JsonValue::String(v.to_rfc3339()),
                Ok(None) => JsonValue::Null,
                Err(_) => decode_text(row, idx),
            },
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => decimal_value(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        decode_text(row, idx)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_temporal<T>(row: &PgRow, idx: usize) -> JsonValue
    where
        T: for<'r> Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres> + ToString,
    {
        match row.try_get::<Option<T>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.to_string()),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_text(row, idx),
        }
    }

    /// Arrays, enums, uuid and other types read back through their text form.
    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
        }
        row.try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => boolean_column(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => binary_column(row, idx),
            _ => decode_dynamic(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(Some(v)) => JsonValue::Number(v.into()),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_dynamic(row, idx),
        }
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<f64>, _>(idx) {
            Ok(Some(v)) => float_value(v),
            Ok(None) => JsonValue::Null,
            Err(_) => decode_dynamic(row, idx),
        }
    }

    /// Expression columns have no declared type; try each storage class in turn.
    fn decode_dynamic(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
        }
        row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(categorize_type("INT", StoreKind::MySql), TypeCategory::Integer);
        assert_eq!(
            categorize_type("BIGINT", StoreKind::Postgres),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", StoreKind::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", StoreKind::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", StoreKind::MySql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", StoreKind::Postgres),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("numeric", StoreKind::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_temporal_types() {
        assert_eq!(categorize_type("DATETIME", StoreKind::MySql), TypeCategory::Timestamp);
        assert_eq!(categorize_type("DATE", StoreKind::MySql), TypeCategory::Date);
        assert_eq!(
            categorize_type("TIMESTAMPTZ", StoreKind::Postgres),
            TypeCategory::TimestampTz
        );
        assert_eq!(categorize_type("DATETIME", StoreKind::SQLite), TypeCategory::Unknown);
    }

    #[test]
    fn test_categorize_text_and_json() {
        assert_eq!(categorize_type("VARCHAR", StoreKind::MySql), TypeCategory::Text);
        assert_eq!(categorize_type("jsonb", StoreKind::Postgres), TypeCategory::Json);
        assert_eq!(categorize_type("BLOB", StoreKind::SQLite), TypeCategory::Binary);
    }

    #[test]
    fn test_decimal_value_keeps_precision() {
        assert_eq!(decimal_value("12.50".to_string()), serde_json::json!(12.5));
        assert_eq!(
            decimal_value("12345678901234567890.01".to_string()),
            JsonValue::String("12345678901234567890.01".to_string())
        );
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(
            decode_binary_value(b"hello world"),
            JsonValue::String("hello world".to_string())
        );
        assert_eq!(
            decode_binary_value(&[0xFF, 0xFE, 0x00, 0x01]),
            JsonValue::String("//4AAQ==".to_string())
        );
        assert_eq!(decode_binary_value(&[]), JsonValue::String(String::new()));
    }
}
