// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Dense typed storage for one column or one node result

use super::value::{tri_state, Value, ValueType};
use crate::error::{EngineError, Result};
use std::mem::size_of;
use std::sync::Arc;

/// Dense vector of values sharing one declared type
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    /// Tri-state booleans (see [`tri_state`])
    Boolean(Vec<u8>),
    Integer(Vec<Option<i64>>),
    /// NaN marks a missing double
    Double(Vec<f64>),
    Symbol(Vec<Option<Arc<str>>>),
}

impl Vector {
    /// Allocate `len` missing values of type `ty`
    pub fn new(ty: ValueType, len: usize) -> Self {
        match ty {
            ValueType::Boolean => Vector::Boolean(vec![tri_state::MISSING; len]),
            ValueType::Integer => Vector::Integer(vec![None; len]),
            ValueType::Double => Vector::Double(vec![f64::NAN; len]),
            ValueType::Symbol => Vector::Symbol(vec![None; len]),
        }
    }

    pub fn with_capacity(ty: ValueType, capacity: usize) -> Self {
        match ty {
            ValueType::Boolean => Vector::Boolean(Vec::with_capacity(capacity)),
            ValueType::Integer => Vector::Integer(Vec::with_capacity(capacity)),
            ValueType::Double => Vector::Double(Vec::with_capacity(capacity)),
            ValueType::Symbol => Vector::Symbol(Vec::with_capacity(capacity)),
        }
    }

    /// Build a vector of type `ty` from boxed values
    pub fn from_values(ty: ValueType, values: &[Value]) -> Result<Self> {
        let mut res = Self::with_capacity(ty, values.len());
        for value in values {
            res.push(value)?;
        }
        Ok(res)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Vector::Boolean(_) => ValueType::Boolean,
            Vector::Integer(_) => ValueType::Integer,
            Vector::Double(_) => ValueType::Double,
            Vector::Symbol(_) => ValueType::Symbol,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Boolean(v) => v.len(),
            Vector::Integer(v) => v.len(),
            Vector::Double(v) => v.len(),
            Vector::Symbol(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boxed element at `index`
    pub fn get(&self, index: usize) -> Value {
        match self {
            Vector::Boolean(v) => Value::from_tri_state(v[index]),
            Vector::Integer(v) => v[index].map(Value::Integer).unwrap_or(Value::Missing),
            Vector::Double(v) => Value::double(v[index]),
            Vector::Symbol(v) => v[index].clone().map(Value::Symbol).unwrap_or(Value::Missing),
        }
    }

    pub fn set(&mut self, index: usize, value: &Value) -> Result<()> {
        let ty = self.value_type();
        check_fits(value, ty)?;
        match self {
            Vector::Boolean(v) => v[index] = value.to_tri_state(),
            Vector::Integer(v) => v[index] = value.as_i64(),
            Vector::Double(v) => v[index] = value.as_f64().unwrap_or(f64::NAN),
            Vector::Symbol(v) => v[index] = value.as_symbol().cloned(),
        }
        Ok(())
    }

    pub fn push(&mut self, value: &Value) -> Result<()> {
        let ty = self.value_type();
        check_fits(value, ty)?;
        match self {
            Vector::Boolean(v) => v.push(value.to_tri_state()),
            Vector::Integer(v) => v.push(value.as_i64()),
            Vector::Double(v) => v.push(value.as_f64().unwrap_or(f64::NAN)),
            Vector::Symbol(v) => v.push(value.as_symbol().cloned()),
        }
        Ok(())
    }

    /// Approximate heap footprint, used by the cache budget
    pub fn size_in_bytes(&self) -> usize {
        let payload = match self {
            Vector::Boolean(v) => v.capacity() * size_of::<u8>(),
            Vector::Integer(v) => v.capacity() * size_of::<Option<i64>>(),
            Vector::Double(v) => v.capacity() * size_of::<f64>(),
            Vector::Symbol(v) => {
                v.capacity() * size_of::<Option<Arc<str>>>()
                    + v.iter().flatten().map(|s| s.len()).sum::<usize>()
            }
        };
        payload + size_of::<Self>()
    }

    pub fn as_booleans(&self) -> Option<&[u8]> {
        match self {
            Vector::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_integers(&self) -> Option<&[Option<i64>]> {
        match self {
            Vector::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self {
            Vector::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_symbols(&self) -> Option<&[Option<Arc<str>>]> {
        match self {
            Vector::Symbol(v) => Some(v),
            _ => None,
        }
    }
}

fn check_fits(value: &Value, ty: ValueType) -> Result<()> {
    if value.fits(ty) {
        Ok(())
    } else {
        Err(EngineError::type_mismatch(
            ty,
            value.value_type().unwrap_or(ty),
            "vector element",
        ))
    }
}
