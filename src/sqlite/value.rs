use crate::value::Value;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(v) => ValueRef::Integer(*v),
            Value::Real(v) => ValueRef::Real(*v),
            Value::Text(v) => ValueRef::Text(v.as_bytes()),
            Value::Blob(v) => ValueRef::Blob(v),
        };

        Ok(ToSqlOutput::Borrowed(value))
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            // SQLite does not enforce UTF-8 on TEXT; keep the bytes as they are
            ValueRef::Text(v) => match std::str::from_utf8(v) {
                Ok(text) => Value::Text(text.to_owned()),
                Err(_) => Value::Blob(v.to_vec()),
            },
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        }
    }
}
