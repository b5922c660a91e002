//! Column value codec.
//!
//! `json` columns travel as JSON text and come back as structured values;
//! boolean-mode columns come back as `true`/`false` instead of 0/1;
//! `blob` columns travel as arrays of byte values in both directions.

use serde_json::Value;
use tessera_core::{Column, Table};
use tessera_storage::value::byte_array;

use crate::error::QueryBuildError;

/// Reject a written value the column cannot store faithfully.
pub fn check(table: &Table, column: &Column, value: &Value) -> Result<(), QueryBuildError> {
    if !column.is_blob() {
        return Ok(());
    }
    match value {
        Value::Null => Ok(()),
        Value::Array(items) if byte_array(items).is_some() => Ok(()),
        _ => Err(QueryBuildError::InvalidValue {
            table: table.name.clone(),
            column: column.name.clone(),
            reason: "expected an array of byte values (0-255)".to_string(),
        }),
    }
}

/// Value to bind for `column`.
pub fn encode(column: &Column, value: &Value) -> Value {
    if column.is_json() && !value.is_null() {
        Value::String(value.to_string())
    } else {
        value.clone()
    }
}

/// Decode one cell read from `column`.
pub fn decode(column: &Column, value: Value) -> Value {
    match value {
        Value::String(text) if column.is_json() => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        Value::Number(n) if column.is_boolean() => match n.as_i64() {
            Some(i) => Value::Bool(i != 0),
            None => Value::Number(n),
        },
        other => other,
    }
}

/// Decode every known column of a row object. Other keys pass through.
pub fn decode_row(table: &Table, row: Value) -> Value {
    match row {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| match table.column(&key) {
                    Some(column) => {
                        let value = decode(column, value);
                        (key, value)
                    }
                    None => (key, value),
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_core::{ColumnMode, ColumnType};

    #[test]
    fn test_json_columns_encode_as_text() {
        let profile = Column::new("profile", ColumnType::Json);
        assert_eq!(encode(&profile, &json!({"a": 1})), json!("{\"a\":1}"));
        assert_eq!(encode(&profile, &json!(null)), json!(null));
        assert_eq!(decode(&profile, json!("{\"a\":1}")), json!({"a": 1}));
        // Text that is not JSON is returned as-is.
        assert_eq!(decode(&profile, json!("not json")), json!("not json"));
    }

    #[test]
    fn test_boolean_mode_decodes_integers() {
        let active = Column::new("active", ColumnType::Integer).with_mode(ColumnMode::Boolean);
        assert_eq!(decode(&active, json!(1)), json!(true));
        assert_eq!(decode(&active, json!(0)), json!(false));
        assert_eq!(decode(&active, json!(null)), json!(null));

        let stamp = Column::new("at", ColumnType::Integer).with_mode(ColumnMode::TimestampMs);
        assert_eq!(decode(&stamp, json!(1700000000000i64)), json!(1700000000000i64));
    }

    #[test]
    fn test_blob_columns_accept_only_byte_arrays() {
        let body = Column::new("body", ColumnType::Blob);
        let table = Table::new("files", vec![body.clone()]);
        assert_eq!(check(&table, &body, &json!([0, 7, 255])), Ok(()));
        assert_eq!(check(&table, &body, &json!(null)), Ok(()));
        assert_eq!(encode(&body, &json!([1, 2])), json!([1, 2]));

        let err = check(&table, &body, &json!("bytes")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for files.body: expected an array of byte values (0-255)"
        );
        assert!(check(&table, &body, &json!([256])).is_err());

        let name = Column::new("name", ColumnType::Text);
        assert_eq!(check(&table, &name, &json!("anything")), Ok(()));
    }

    #[test]
    fn test_decode_row_leaves_unknown_keys() {
        let table = Table::new(
            "users",
            vec![
                Column::new("id", ColumnType::Text),
                Column::new("profile", ColumnType::Json),
            ],
        );
        let row = decode_row(&table, json!({"id": "u1", "profile": "[1,2]", "count": 3}));
        assert_eq!(row, json!({"id": "u1", "profile": [1, 2], "count": 3}));
    }
}
