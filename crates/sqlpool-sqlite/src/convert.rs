//! Conversions between sqlpool and rusqlite types.

use chrono::{DateTime, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use sqlpool_driver::Value;

/// Convert a bound parameter into its SQLite storage class.
///
/// Timestamps are stored as integer Unix seconds.
pub(crate) fn to_sql(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Double(v) => SqlValue::Real(v),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Blob(v),
        Value::Timestamp(v) => SqlValue::Integer(unix_seconds(v)),
    }
}

/// Convert a fetched column into an owned [`Value`].
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn unix_seconds(value: DateTime<Utc>) -> i64 {
    value.timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_stored_as_seconds() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        assert_eq!(to_sql(Value::Timestamp(ts)), SqlValue::Integer(1_700_000_000));
    }

    #[test]
    fn test_text_is_decoded_lossily() {
        assert_eq!(from_sql(ValueRef::Text(b"abc")), Value::Text("abc".into()));
        assert_eq!(
            from_sql(ValueRef::Text(&[0x61, 0xff])),
            Value::Text("a\u{fffd}".into())
        );
    }

    #[test]
    fn test_storage_classes() {
        assert_eq!(to_sql(Value::Null), SqlValue::Null);
        assert_eq!(to_sql(Value::Double(1.5)), SqlValue::Real(1.5));
        assert_eq!(from_sql(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
        assert_eq!(from_sql(ValueRef::Integer(-3)), Value::Integer(-3));
    }
}
