use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::ApiError;

/// SQL bindable value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

/// How a JSON field must look to be written into a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Non-empty string, NOT NULL column.
    Text,
    /// String or null.
    NullableText,
    /// Non-negative integer.
    Unsigned,
    /// Non-negative integer that fits a signed `INT` column.
    Count,
    /// Finite, non-negative number.
    Amount,
    Bool,
    /// `YYYY-MM-DD`.
    Date,
}

/// A column a client is allowed to update.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl SqlUpdate {
    /// Value bound for `column`, if the payload set it.
    pub fn value_of(&self, columns: &[&str], column: &str) -> Option<&SqlValue> {
        columns
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.values.get(i))
    }
}

fn convert(column: &Column, value: &Value) -> Result<SqlValue, ApiError> {
    let invalid = || ApiError::bad_request(format!("Invalid value for field '{}'", column.name));

    match (column.kind, value) {
        (ColumnKind::NullableText, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text | ColumnKind::NullableText, Value::String(s)) => {
            let s = s.trim();
            if column.kind == ColumnKind::Text && s.is_empty() {
                return Err(ApiError::bad_request(format!(
                    "Field '{}' must not be empty",
                    column.name
                )));
            }
            Ok(SqlValue::String(s.to_string()))
        }
        (ColumnKind::Unsigned, Value::Number(n)) => n.as_u64().map(SqlValue::U64).ok_or_else(invalid),
        (ColumnKind::Count, Value::Number(n)) => match n.as_i64() {
            Some(v) if (0..=i64::from(i32::MAX)).contains(&v) => Ok(SqlValue::I64(v)),
            _ => Err(invalid()),
        },
        (ColumnKind::Amount, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => Ok(SqlValue::F64(f)),
            _ => Err(invalid()),
        },
        (ColumnKind::Bool, Value::Bool(b)) => Ok(SqlValue::Bool(*b)),
        (ColumnKind::Date, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(SqlValue::Date)
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Builds `UPDATE <table> SET ... WHERE <id_column> = ?` from a JSON object.
///
/// Only keys listed in `allowed` are accepted; anything else is a 400, so
/// column names in the statement never come from the client.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[Column],
    id_column: &str,
    id_value: u64,
) -> Result<(SqlUpdate, Vec<&'static str>), ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut fields: Vec<(&String, &Value)> = obj.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let mut columns = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len() + 1);

    for (key, value) in fields {
        let column = allowed
            .iter()
            .find(|c| c.name == key.as_str())
            .ok_or_else(|| ApiError::bad_request(format!("Field '{key}' cannot be updated")))?;

        values.push(convert(column, value)?);
        columns.push(column.name);
    }

    let set_clause = columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {table} SET {set_clause} WHERE {id_column} = ?");

    values.push(SqlValue::U64(id_value));

    Ok((SqlUpdate { sql, values }, columns))
}

/// Execute the update and return the number of affected rows.
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::new("first_name", ColumnKind::Text),
        Column::new("last_name", ColumnKind::NullableText),
        Column::new("department_id", ColumnKind::Unsigned),
        Column::new("available_leaves", ColumnKind::Count),
        Column::new("base_pay", ColumnKind::Amount),
        Column::new("date_of_joining", ColumnKind::Date),
    ];

    #[test]
    fn builds_statement_from_whitelisted_fields() {
        let payload = json!({ "first_name": " Jane ", "department_id": 4 });
        let (update, columns) = build_update_sql("users", &payload, COLUMNS, "id", 9).unwrap();

        assert_eq!(update.sql, "UPDATE users SET department_id = ?, first_name = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::U64(4),
                SqlValue::String("Jane".into()),
                SqlValue::U64(9)
            ]
        );
        assert_eq!(
            update.value_of(&columns, "first_name"),
            Some(&SqlValue::String("Jane".into()))
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let payload = json!({ "password": "x" });
        assert!(build_update_sql("users", &payload, COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn empty_or_non_object_payload_is_rejected() {
        assert!(build_update_sql("users", &json!({}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("users", &json!([1, 2]), COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn values_must_match_column_kind() {
        let cases = [
            json!({ "first_name": null }),
            json!({ "first_name": "   " }),
            json!({ "department_id": -1 }),
            json!({ "base_pay": -10.5 }),
            json!({ "date_of_joining": "01/02/2026" }),
        ];
        for payload in cases {
            assert!(
                build_update_sql("users", &payload, COLUMNS, "id", 1).is_err(),
                "{payload} should be rejected"
            );
        }
    }

    #[test]
    fn count_rejects_negative_and_oversized_values() {
        for value in [json!(-40), json!(2_147_483_648u64), json!(2.5)] {
            let payload = json!({ "available_leaves": value });
            assert!(
                build_update_sql("users", &payload, COLUMNS, "id", 7).is_err(),
                "{payload} should be rejected"
            );
        }

        let payload = json!({ "available_leaves": 0 });
        let (update, _) = build_update_sql("users", &payload, COLUMNS, "id", 7).unwrap();
        assert_eq!(update.values, vec![SqlValue::I64(0), SqlValue::U64(7)]);
    }

    #[test]
    fn nullable_text_accepts_null() {
        let payload = json!({ "last_name": null, "date_of_joining": "2026-02-01" });
        let (update, _) = build_update_sql("users", &payload, COLUMNS, "id", 1).unwrap();

        assert_eq!(update.values[0], SqlValue::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
        assert_eq!(update.values[1], SqlValue::Null);
    }
}
