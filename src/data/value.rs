// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scalar values and their declared types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Raw tri-state boolean encoding used by the hot loops
pub mod tri_state {
    pub const FALSE: u8 = 0;
    pub const TRUE: u8 = 1;
    pub const MISSING: u8 = 2;

    pub fn from_option(value: Option<bool>) -> u8 {
        match value {
            Some(false) => FALSE,
            Some(true) => TRUE,
            None => MISSING,
        }
    }

    pub fn to_option(raw: u8) -> Option<bool> {
        match raw {
            FALSE => Some(false),
            TRUE => Some(true),
            _ => None,
        }
    }
}

/// Declared element type of a column, a vector or an expression result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Integer,
    Double,
    Symbol,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::Symbol => "symbol",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" | "bool" => Some(ValueType::Boolean),
            "integer" | "int" => Some(ValueType::Integer),
            "double" | "float" => Some(ValueType::Double),
            "symbol" | "string" => Some(ValueType::Symbol),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single boxed value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Missing,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Symbol(Arc<str>),
}

impl Value {
    /// Build a double, mapping NaN to `Missing`
    pub fn double(value: f64) -> Self {
        if value.is_nan() {
            Value::Missing
        } else {
            Value::Double(value)
        }
    }

    pub fn symbol(value: &str) -> Self {
        Value::Symbol(Arc::from(value))
    }

    pub fn from_tri_state(raw: u8) -> Self {
        match tri_state::to_option(raw) {
            Some(b) => Value::Boolean(b),
            None => Value::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing) || matches!(self, Value::Double(d) if d.is_nan())
    }

    /// Type of a present value; `None` for `Missing`
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Missing => None,
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Double(_) => Some(ValueType::Double),
            Value::Symbol(_) => Some(ValueType::Symbol),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view: booleans map to 0/1, symbols and missing to `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) if !d.is_nan() => Some(*d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Arc<str>> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_tri_state(&self) -> u8 {
        tri_state::from_option(self.as_bool())
    }

    /// Whether this value can be stored in a column of type `ty`
    pub fn fits(&self, ty: ValueType) -> bool {
        match (self, ty) {
            (Value::Missing, _) => true,
            (Value::Integer(_), ValueType::Double) => true,
            (v, ty) => v.value_type() == Some(ty),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_missing() && b.is_missing() => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::symbol(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => f.write_str("missing"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            // keep a decimal point so the text parses back as a double
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => write!(f, "{:.1}", d),
            Value::Double(d) => write!(f, "{}", d),
            Value::Symbol(s) => write!(f, "{:?}", s),
        }
    }
}
