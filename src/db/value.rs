// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bound values and column bind types.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{FrameworkError, Result};

/// A value bound to a statement or read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form, as a text column would store it.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
        })
    }
}

/// How a value is bound: integer (`i`), double (`d`) or string (`s`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindType {
    Integer,
    Real,
    Text,
}

impl BindType {
    pub fn code(self) -> char {
        match self {
            BindType::Integer => 'i',
            BindType::Real => 'd',
            BindType::Text => 's',
        }
    }

    /// Bind type inferred from a value. Null binds as a string.
    pub fn for_value(value: &Value) -> Self {
        match value {
            Value::Integer(_) => BindType::Integer,
            Value::Real(_) => BindType::Real,
            Value::Text(_) | Value::Null => BindType::Text,
        }
    }

    /// Convert a value to this bind type before binding it to `column`.
    pub fn coerce(self, column: &str, value: Value) -> Result<Value> {
        let invalid = |value: &Value| FrameworkError::InvalidValue {
            column: column.to_string(),
            reason: format!("'{}' is not a valid {} value", value.to_text(), self.label()),
        };
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (BindType::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (BindType::Integer, Value::Real(f)) => Ok(Value::Integer(f.trunc() as i64)),
            (BindType::Integer, v @ Value::Text(_)) => {
                v.as_i64().map(Value::Integer).ok_or_else(|| invalid(&v))
            }
            (BindType::Real, Value::Real(f)) => Ok(Value::Real(f)),
            (BindType::Real, v) => v.as_f64().map(Value::Real).ok_or_else(|| invalid(&v)),
            (BindType::Text, v) => Ok(Value::Text(v.to_text())),
        }
    }

    fn label(self) -> &'static str {
        match self {
            BindType::Integer => "integer",
            BindType::Real => "double",
            BindType::Text => "string",
        }
    }
}
