//! Filter object → SQL `WHERE` fragment
//!
//! Filters use the operator object syntax (`{"price": {"$gt": 10}}`). Field
//! names are validated and every value is bound, never spliced into SQL.

use cdp_common::{Error, Result};
use serde_json::{Map, Value};

use crate::db::SqlValue;

/// Operators whose empty result must not trigger the unfiltered retry
const COMPARISON_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$lt", "$lte", "$gt", "$gte", "$in", "$notIn", "$between",
];

/// Compiled `WHERE` fragment and its positional binds
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

/// Compile a filter object; `null` and `{}` match everything
pub fn compile(filter: &Value) -> Result<CompiledFilter> {
    let mut compiler = Compiler::default();
    let sql = match filter {
        Value::Null => "1=1".to_string(),
        Value::Object(map) => compiler.group(map)?,
        other => {
            return Err(Error::InvalidInput(format!(
                "Filters must be an object, got {}",
                other
            )))
        }
    };

    Ok(CompiledFilter {
        sql,
        binds: compiler.binds,
    })
}

/// Whether any explicit comparison or inclusion operator appears in the filter
pub fn uses_comparison_operators(filter: &Value) -> bool {
    match filter {
        Value::Object(map) => map.iter().any(|(key, value)| {
            COMPARISON_OPERATORS.contains(&key.as_str()) || uses_comparison_operators(value)
        }),
        Value::Array(items) => items.iter().any(uses_comparison_operators),
        _ => false,
    }
}

/// Column a filter field resolves to
enum Column {
    Direct(&'static str),
    /// JSON path inside the document
    Document(String),
}

impl Column {
    fn resolve(field: &str) -> Result<Self> {
        match field {
            "id" => Ok(Column::Direct("id")),
            "publishedAt" => Ok(Column::Direct("published_at")),
            "createdAt" => Ok(Column::Direct("created_at")),
            "updatedAt" => Ok(Column::Direct("updated_at")),
            _ if is_valid_field_name(field) => Ok(Column::Document(format!("$.{}", field))),
            _ => Err(Error::InvalidInput(format!("Invalid filter field: {}", field))),
        }
    }
}

fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 100
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Default)]
struct Compiler {
    binds: Vec<SqlValue>,
}

impl Compiler {
    /// Conjunction of every entry of a filter object
    fn group(&mut self, map: &Map<String, Value>) -> Result<String> {
        if map.is_empty() {
            return Ok("1=1".to_string());
        }

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.as_str() {
                "$and" => self.logical(value, " AND ", "1=1")?,
                "$or" => self.logical(value, " OR ", "1=0")?,
                "$not" => format!("NOT ({})", self.nested_group(value)?),
                op if op.starts_with('$') => {
                    return Err(Error::InvalidInput(format!(
                        "Operator {} is not allowed at field level",
                        op
                    )))
                }
                field => self.field(field, value)?,
            };
            clauses.push(clause);
        }

        Ok(join(clauses, " AND "))
    }

    fn nested_group(&mut self, value: &Value) -> Result<String> {
        match value {
            Value::Object(map) => self.group(map),
            other => Err(Error::InvalidInput(format!(
                "Expected a filter object, got {}",
                other
            ))),
        }
    }

    fn logical(&mut self, value: &Value, separator: &str, when_empty: &str) -> Result<String> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(Error::InvalidInput(format!(
                    "Logical operators take an array, got {}",
                    other
                )))
            }
        };
        if items.is_empty() {
            return Ok(when_empty.to_string());
        }

        let clauses = items
            .iter()
            .map(|item| self.nested_group(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(join(clauses, separator))
    }

    /// Conditions on one field
    fn field(&mut self, field: &str, value: &Value) -> Result<String> {
        let column = Column::resolve(field)?;

        match value {
            Value::Null => Ok(format!("{} IS NULL", self.column(&column))),
            Value::Array(items) => self.membership(&column, items, false),
            Value::Object(operators) => {
                if operators.is_empty() {
                    return Ok("1=1".to_string());
                }
                let clauses = operators
                    .iter()
                    .map(|(op, operand)| self.operator(field, &column, op, operand))
                    .collect::<Result<Vec<_>>>()?;
                Ok(join(clauses, " AND "))
            }
            // Scalar shorthand: implicit equality
            scalar => {
                let expr = self.column(&column);
                self.bind(scalar)?;
                Ok(format!("{} = ?", expr))
            }
        }
    }

    fn operator(&mut self, field: &str, column: &Column, op: &str, operand: &Value) -> Result<String> {
        match op {
            "$eq" if operand.is_null() => Ok(format!("{} IS NULL", self.column(column))),
            "$ne" if operand.is_null() => Ok(format!("{} IS NOT NULL", self.column(column))),
            "$eq" | "$ne" | "$lt" | "$lte" | "$gt" | "$gte" => {
                let sql_op = match op {
                    "$eq" => "=",
                    "$ne" => "IS NOT",
                    "$lt" => "<",
                    "$lte" => "<=",
                    "$gt" => ">",
                    _ => ">=",
                };
                let expr = self.column(column);
                self.bind(operand)?;
                Ok(format!("{} {} ?", expr, sql_op))
            }
            "$in" | "$notIn" => {
                let negate = op == "$notIn";
                match operand {
                    Value::Array(items) => self.membership(column, items, negate),
                    single => self.membership(column, std::slice::from_ref(single), negate),
                }
            }
            "$between" => match operand.as_array().map(Vec::as_slice) {
                Some([low, high]) => {
                    let expr = self.column(column);
                    self.bind(low)?;
                    self.bind(high)?;
                    Ok(format!("{} BETWEEN ? AND ?", expr))
                }
                _ => Err(Error::InvalidInput(format!(
                    "$between on {} takes exactly two values",
                    field
                ))),
            },
            "$contains" | "$notContains" | "$containsi" => {
                let text = operand.as_str().ok_or_else(|| {
                    Error::InvalidInput(format!("{} on {} takes a string", op, field))
                })?;
                let expr = self.column(column);
                self.binds.push(SqlValue::Text(text.to_string()));
                Ok(match op {
                    "$contains" => format!("instr({}, ?) > 0", expr),
                    "$notContains" => format!("instr({}, ?) = 0", expr),
                    _ => format!("instr(lower({}), lower(?)) > 0", expr),
                })
            }
            "$null" | "$notNull" => {
                let wants_null = flag(operand).ok_or_else(|| {
                    Error::InvalidInput(format!("{} on {} takes a boolean", op, field))
                })? == (op == "$null");
                let expr = self.column(column);
                Ok(if wants_null {
                    format!("{} IS NULL", expr)
                } else {
                    format!("{} IS NOT NULL", expr)
                })
            }
            op if op.starts_with('$') => Err(Error::InvalidInput(format!(
                "Unsupported filter operator: {}",
                op
            ))),
            nested => Err(Error::InvalidInput(format!(
                "Nested filter {}.{} is not supported",
                field, nested
            ))),
        }
    }

    fn membership(&mut self, column: &Column, items: &[Value], negate: bool) -> Result<String> {
        if items.is_empty() {
            return Ok(if negate { "1=1" } else { "1=0" }.to_string());
        }

        let expr = self.column(column);
        for item in items {
            self.bind(item)?;
        }
        let placeholders = vec!["?"; items.len()].join(", ");
        let keyword = if negate { "NOT IN" } else { "IN" };
        Ok(format!("{} {} ({})", expr, keyword, placeholders))
    }

    /// SQL expression for a column, pushing the JSON path bind when needed
    fn column(&mut self, column: &Column) -> String {
        match column {
            Column::Direct(name) => name.to_string(),
            Column::Document(path) => {
                self.binds.push(SqlValue::Text(path.clone()));
                "json_extract(document, ?)".to_string()
            }
        }
    }

    fn bind(&mut self, value: &Value) -> Result<()> {
        let bound = match value {
            Value::Null => SqlValue::Null,
            // json_extract yields 1/0 for JSON booleans
            Value::Bool(b) => SqlValue::Int(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => {
                return Err(Error::InvalidInput(format!(
                    "Filter values must be scalars, got {}",
                    other
                )))
            }
        };
        self.binds.push(bound);
        Ok(())
    }
}

/// Boolean operand, accepting the `"true"` / `"false"` strings of query params
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn join(clauses: Vec<String>, separator: &str) -> String {
    if clauses.len() == 1 {
        clauses.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", clauses.join(separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert_eq!(compile(&json!({})).unwrap().sql, "1=1");
        assert_eq!(compile(&Value::Null).unwrap().sql, "1=1");
    }

    #[test]
    fn test_scalar_shorthand_is_equality() {
        let compiled = compile(&json!({ "slug": "home" })).unwrap();
        assert_eq!(compiled.sql, "json_extract(document, ?) = ?");
        assert_eq!(compiled.binds, vec![text("$.slug"), text("home")]);
    }

    #[test]
    fn test_system_columns() {
        let compiled = compile(&json!({ "publishedAt": { "$null": false } })).unwrap();
        assert_eq!(compiled.sql, "published_at IS NOT NULL");
        assert!(compiled.binds.is_empty());

        let compiled = compile(&json!({ "id": { "$gte": 3 } })).unwrap();
        assert_eq!(compiled.sql, "id >= ?");
        assert_eq!(compiled.binds, vec![SqlValue::Int(3)]);
    }

    #[test]
    fn test_multiple_operators_bind_path_each_time() {
        let compiled = compile(&json!({ "price": { "$gt": 1, "$lt": 5.5 } })).unwrap();
        assert_eq!(
            compiled.sql,
            "(json_extract(document, ?) > ? AND json_extract(document, ?) < ?)"
        );
        assert_eq!(
            compiled.binds,
            vec![
                text("$.price"),
                SqlValue::Int(1),
                text("$.price"),
                SqlValue::Float(5.5)
            ]
        );
    }

    #[test]
    fn test_and_or_not() {
        let compiled = compile(&json!({
            "$and": [{ "locale": "en" }, { "$or": [{ "id": 1 }, { "id": 2 }] }],
            "$not": { "hidden": true }
        }))
        .unwrap();
        assert_eq!(
            compiled.sql,
            "((json_extract(document, ?) = ? AND (id = ? OR id = ?)) AND NOT (json_extract(document, ?) = ?))"
        );
        assert_eq!(
            compiled.binds,
            vec![
                text("$.locale"),
                text("en"),
                SqlValue::Int(1),
                SqlValue::Int(2),
                text("$.hidden"),
                SqlValue::Int(1)
            ]
        );
    }

    #[test]
    fn test_in_and_not_in() {
        let compiled = compile(&json!({ "id": { "$in": [1, 2, 3] } })).unwrap();
        assert_eq!(compiled.sql, "id IN (?, ?, ?)");

        assert_eq!(compile(&json!({ "id": { "$in": [] } })).unwrap().sql, "1=0");
        assert_eq!(compile(&json!({ "id": { "$notIn": [] } })).unwrap().sql, "1=1");

        // Array shorthand behaves as $in
        let compiled = compile(&json!({ "id": [4, 5] })).unwrap();
        assert_eq!(compiled.sql, "id IN (?, ?)");
    }

    #[test]
    fn test_eq_null_and_ne() {
        assert_eq!(
            compile(&json!({ "id": { "$eq": null } })).unwrap().sql,
            "id IS NULL"
        );
        assert_eq!(compile(&json!({ "id": { "$ne": 2 } })).unwrap().sql, "id IS NOT ?");
    }

    #[test]
    fn test_between_requires_two_values() {
        let compiled = compile(&json!({ "id": { "$between": [1, 9] } })).unwrap();
        assert_eq!(compiled.sql, "id BETWEEN ? AND ?");

        let err = compile(&json!({ "id": { "$between": [1] } })).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_contains() {
        let compiled = compile(&json!({ "title": { "$containsi": "Home" } })).unwrap();
        assert_eq!(compiled.sql, "instr(lower(json_extract(document, ?)), lower(?)) > 0");
        assert_eq!(compiled.binds, vec![text("$.title"), text("Home")]);
    }

    #[test]
    fn test_rejects_bad_input() {
        for filter in [
            json!({ "title; DROP TABLE entries": "x" }),
            json!({ "id": { "$regex": "x" } }),
            json!({ "author": { "name": "x" } }),
            json!({ "$and": { "id": 1 } }),
            json!({ "$where": "1" }),
            json!({ "id": { "$eq": [1] } }),
            json!(["id"]),
        ] {
            let err = compile(&filter).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "accepted {}", filter);
        }
    }

    #[test]
    fn test_comparison_operator_detection() {
        assert!(uses_comparison_operators(&json!({ "price": { "$gt": 1 } })));
        assert!(uses_comparison_operators(&json!({ "$or": [{ "id": { "$in": [1] } }] })));
        assert!(!uses_comparison_operators(&json!({ "locale": "en" })));
        assert!(!uses_comparison_operators(&json!({ "title": { "$contains": "a" } })));
        assert!(!uses_comparison_operators(&json!({})));
    }
}
