//! Predicate compilation.
//!
//! A predicate is a JSON object mapping column names either to a value
//! (equality) or to an operator object such as `{"gte": 18, "lt": 65}`.
//! Every key of one predicate, and every predicate of one query, is ANDed.

use serde_json::{Map, Value};
use tessera_core::{quote_ident, Column, Table};

use crate::codec::encode;
use crate::error::QueryBuildError;

/// Operator keys recognised inside an operator object.
pub const OPERATORS: [&str; 7] = ["eq", "gt", "lt", "gte", "lte", "in", "isNullish"];

/// One compiled comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Gt(String, Value),
    Lt(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
}

impl Condition {
    /// Render as SQL, pushing bind values onto `params`.
    pub fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Condition::Eq(c, v) => binary(params, c, "=", v),
            Condition::Gt(c, v) => binary(params, c, ">", v),
            Condition::Lt(c, v) => binary(params, c, "<", v),
            Condition::Gte(c, v) => binary(params, c, ">=", v),
            Condition::Lte(c, v) => binary(params, c, "<=", v),
            Condition::In(_, values) if values.is_empty() => "0 = 1".to_string(),
            Condition::In(c, values) => {
                params.extend(values.iter().cloned());
                let marks = vec!["?"; values.len()].join(", ");
                format!("{} IN ({})", quote_ident(c), marks)
            }
            Condition::IsNull(c) => format!("{} IS NULL", quote_ident(c)),
            Condition::IsNotNull(c) => format!("{} IS NOT NULL", quote_ident(c)),
        }
    }
}

fn binary(params: &mut Vec<Value>, column: &str, op: &str, value: &Value) -> String {
    params.push(value.clone());
    format!("{} {} ?", quote_ident(column), op)
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| OPERATORS.contains(&k.as_str()))
}

fn invalid(column: &Column, reason: &str) -> QueryBuildError {
    QueryBuildError::InvalidPredicate {
        column: column.name.clone(),
        reason: reason.to_string(),
    }
}

/// Look up `name` in `table`, rejecting anything the schema does not declare.
pub fn resolve_column<'t>(table: &'t Table, name: &str) -> Result<&'t Column, QueryBuildError> {
    table
        .column(name)
        .ok_or_else(|| QueryBuildError::UnknownColumn {
            table: table.name.clone(),
            column: name.to_string(),
        })
}

fn equality(column: &Column, value: &Value) -> Condition {
    if value.is_null() {
        Condition::IsNull(column.name.clone())
    } else {
        Condition::Eq(column.name.clone(), encode(column, value))
    }
}

fn operator(column: &Column, op: &str, operand: &Value) -> Result<Condition, QueryBuildError> {
    let name = column.name.clone();
    let value = encode(column, operand);
    Ok(match op {
        "eq" => equality(column, operand),
        "gt" => Condition::Gt(name, value),
        "lt" => Condition::Lt(name, value),
        "gte" => Condition::Gte(name, value),
        "lte" => Condition::Lte(name, value),
        "in" => {
            let items = operand
                .as_array()
                .ok_or_else(|| invalid(column, "'in' expects an array"))?;
            Condition::In(name, items.iter().map(|v| encode(column, v)).collect())
        }
        "isNullish" => match operand.as_bool() {
            Some(true) => Condition::IsNull(name),
            Some(false) => Condition::IsNotNull(name),
            None => return Err(invalid(column, "'isNullish' expects a boolean")),
        },
        other => return Err(invalid(column, &format!("unknown operator '{}'", other))),
    })
}

/// Compile one predicate object against `table`.
pub fn compile_predicate(table: &Table, predicate: &Value) -> Result<Vec<Condition>, QueryBuildError> {
    let map = predicate
        .as_object()
        .ok_or(QueryBuildError::NotAnObject { what: "predicate" })?;

    let mut conditions = Vec::with_capacity(map.len());
    for (name, value) in map {
        let column = resolve_column(table, name)?;
        match value {
            Value::Object(ops) if is_operator_object(ops) => {
                for (op, operand) in ops {
                    conditions.push(operator(column, op, operand)?);
                }
            }
            Value::Object(_) | Value::Array(_) if !column.is_json() => {
                return Err(invalid(column, "structured values need an operator"));
            }
            _ => conditions.push(equality(column, value)),
        }
    }
    Ok(conditions)
}

/// `WHERE` clause (with leading space) for all `conditions`, or empty.
pub fn where_clause(conditions: &[Condition], params: &mut Vec<Value>) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions.iter().map(|c| c.render(params)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tessera_core::ColumnType;

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                Column::new("id", ColumnType::Text),
                Column::new("age", ColumnType::Integer),
                Column::new("profile", ColumnType::Json),
            ],
        )
    }

    fn render(predicate: Value) -> Result<(String, Vec<Value>), QueryBuildError> {
        let conditions = compile_predicate(&users(), &predicate)?;
        let mut params = Vec::new();
        let sql = where_clause(&conditions, &mut params);
        Ok((sql, params))
    }

    #[test]
    fn test_plain_values_are_equalities() -> Result<(), QueryBuildError> {
        let (sql, params) = render(json!({"id": "u1", "age": null}))?;
        assert_eq!(sql, " WHERE \"id\" = ? AND \"age\" IS NULL");
        assert_eq!(params, vec![json!("u1")]);
        Ok(())
    }

    #[test]
    fn test_operator_objects() -> Result<(), QueryBuildError> {
        let (sql, params) = render(json!({"age": {"gte": 18, "lt": 65}, "id": {"in": ["a", "b"]}}))?;
        assert_eq!(
            sql,
            " WHERE \"age\" >= ? AND \"age\" < ? AND \"id\" IN (?, ?)"
        );
        assert_eq!(params, vec![json!(18), json!(65), json!("a"), json!("b")]);

        let (sql, _) = render(json!({"age": {"isNullish": false}}))?;
        assert_eq!(sql, " WHERE \"age\" IS NOT NULL");
        Ok(())
    }

    #[test]
    fn test_empty_in_matches_nothing() -> Result<(), QueryBuildError> {
        let (sql, params) = render(json!({"id": {"in": []}}))?;
        assert_eq!(sql, " WHERE 0 = 1");
        assert!(params.is_empty());
        Ok(())
    }

    #[test]
    fn test_json_column_equality_binds_json_text() -> Result<(), QueryBuildError> {
        let (_, params) = render(json!({"profile": {"a": 1}}))?;
        assert_eq!(params, vec![json!("{\"a\":1}")]);
        Ok(())
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            render(json!({"nope": 1})),
            Err(QueryBuildError::UnknownColumn {
                table: "users".to_string(),
                column: "nope".to_string()
            })
        );
        assert!(matches!(
            render(json!({"age": {"in": 3}})),
            Err(QueryBuildError::InvalidPredicate { .. })
        ));
        assert!(matches!(
            render(json!({"age": {"between": [1, 2]}})),
            Err(QueryBuildError::InvalidPredicate { .. })
        ));
        assert_eq!(
            render(json!([1])),
            Err(QueryBuildError::NotAnObject { what: "predicate" })
        );
    }

    proptest! {
        #[test]
        fn prop_values_are_never_interpolated(value in ".*") {
            let (sql, params) = render(json!({"id": value.clone()})).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(sql, " WHERE \"id\" = ?");
            prop_assert_eq!(params, vec![json!(value)]);
        }
    }
}
