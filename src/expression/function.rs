// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Built-in functions applied row by row to their argument vectors

use crate::data::{tri_state, DataVector, IndexSet, Value, ValueType, Vector};
use crate::error::{EngineError, Result};
use std::sync::Arc;

/// Closed catalogue of row-wise functions
///
/// Missing inputs give missing outputs, except for [`Function::IsMissing`]
/// and the three-valued [`Function::And`] / [`Function::Or`]. Domain errors
/// (division by zero, log of a non-positive number) also give missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Neg,
    Abs,
    Log,
    Sqrt,
    Exp,
    /// Integer to double conversion
    ToDouble,
    /// `x > threshold` over any numeric argument
    GreaterThan(f64),
    /// Equality with a fixed value of the argument type
    Equals(Value),
    Not,
    And,
    Or,
    IsMissing,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Add => "add",
            Function::Sub => "sub",
            Function::Mul => "mul",
            Function::Div => "div",
            Function::Min => "min",
            Function::Max => "max",
            Function::Neg => "neg",
            Function::Abs => "abs",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::ToDouble => "to_double",
            Function::GreaterThan(_) => "gt",
            Function::Equals(_) => "eq",
            Function::Not => "not",
            Function::And => "and",
            Function::Or => "or",
            Function::IsMissing => "is_missing",
        }
    }

    /// Lookup of parameterless functions by name
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "add" => Function::Add,
            "sub" => Function::Sub,
            "mul" => Function::Mul,
            "div" => Function::Div,
            "min" => Function::Min,
            "max" => Function::Max,
            "neg" => Function::Neg,
            "abs" => Function::Abs,
            "log" => Function::Log,
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "to_double" => Function::ToDouble,
            "not" => Function::Not,
            "and" => Function::And,
            "or" => Function::Or,
            "is_missing" => Function::IsMissing,
            _ => return None,
        };
        Some(function)
    }

    pub fn num_inputs(&self) -> usize {
        match self {
            Function::Add
            | Function::Sub
            | Function::Mul
            | Function::Div
            | Function::Min
            | Function::Max
            | Function::And
            | Function::Or => 2,
            _ => 1,
        }
    }

    pub fn output_type(&self) -> ValueType {
        match self {
            Function::GreaterThan(_)
            | Function::Equals(_)
            | Function::Not
            | Function::And
            | Function::Or
            | Function::IsMissing => ValueType::Boolean,
            _ => ValueType::Double,
        }
    }

    /// Expected type of argument `index`, for error reporting
    pub fn input_type(&self, index: usize) -> ValueType {
        debug_assert!(index < self.num_inputs());
        match self {
            Function::ToDouble => ValueType::Integer,
            Function::Not | Function::And | Function::Or => ValueType::Boolean,
            Function::Equals(value) => value.value_type().unwrap_or(ValueType::Double),
            _ => ValueType::Double,
        }
    }

    pub fn accepts_input(&self, index: usize, ty: ValueType) -> bool {
        if index >= self.num_inputs() {
            return false;
        }
        match self {
            Function::GreaterThan(_) => ty.is_numeric(),
            Function::Equals(value) => match value.value_type() {
                Some(expected) => expected == ty || (expected.is_numeric() && ty.is_numeric()),
                None => false,
            },
            Function::IsMissing => true,
            _ => self.input_type(index) == ty,
        }
    }

    pub fn check_arguments(&self, types: &[ValueType]) -> Result<()> {
        if types.len() != self.num_inputs() {
            return Err(EngineError::Arity {
                function: self.name().to_string(),
                expected: self.num_inputs(),
                found: types.len(),
            });
        }
        for (index, &ty) in types.iter().enumerate() {
            if !self.accepts_input(index, ty) {
                return Err(EngineError::type_mismatch(
                    self.input_type(index),
                    ty,
                    format!("argument {} of {}", index, self.name()),
                ));
            }
        }
        Ok(())
    }

    /// Apply to one row of boxed argument values
    pub fn compute(&self, inputs: &[Value]) -> Value {
        debug_assert_eq!(inputs.len(), self.num_inputs());
        match self {
            Function::ToDouble => Value::double(inputs[0].as_f64().unwrap_or(f64::NAN)),
            Function::GreaterThan(threshold) => {
                Value::from_tri_state(greater_than(number(&inputs[0]), *threshold))
            }
            Function::Equals(expected) => Value::from_tri_state(equals(&inputs[0], expected)),
            Function::Not => Value::from_tri_state(not(inputs[0].to_tri_state())),
            Function::And => {
                Value::from_tri_state(and(inputs[0].to_tri_state(), inputs[1].to_tri_state()))
            }
            Function::Or => {
                Value::from_tri_state(or(inputs[0].to_tri_state(), inputs[1].to_tri_state()))
            }
            Function::IsMissing => Value::Boolean(inputs[0].is_missing()),
            _ if self.num_inputs() == 2 => {
                Value::double(self.binary(number(&inputs[0]), number(&inputs[1])))
            }
            _ => Value::double(self.unary(number(&inputs[0]))),
        }
    }

    /// Vectorised application over argument vectors sharing `indices`
    pub fn compute_samples(
        &self,
        indices: &Arc<IndexSet>,
        inputs: &[DataVector],
    ) -> Result<DataVector> {
        let types: Vec<ValueType> = inputs.iter().map(|i| i.value_type()).collect();
        self.check_arguments(&types)?;
        let n = indices.len();
        for input in inputs {
            debug_assert_eq!(input.len(), n, "argument vectors must share the index set");
        }

        if let Some(values) = inputs
            .iter()
            .map(|i| i.constant_value().cloned())
            .collect::<Option<Vec<Value>>>()
        {
            let value = self.compute(&values);
            return Ok(DataVector::constant(indices.clone(), self.output_type(), value));
        }

        let vector = match self {
            Function::ToDouble => Vector::Double(
                inputs[0]
                    .integers()?
                    .map(|v| v.map_or(f64::NAN, |i| i as f64))
                    .collect(),
            ),
            Function::GreaterThan(threshold) => Vector::Boolean(
                inputs[0]
                    .numbers()?
                    .map(|x| greater_than(x, *threshold))
                    .collect(),
            ),
            Function::Equals(expected) => {
                Vector::Boolean(inputs[0].iter().map(|v| equals(&v, expected)).collect())
            }
            Function::Not => Vector::Boolean(inputs[0].booleans()?.map(not).collect()),
            Function::And => Vector::Boolean(
                inputs[0]
                    .booleans()?
                    .zip(inputs[1].booleans()?)
                    .map(|(a, b)| and(a, b))
                    .collect(),
            ),
            Function::Or => Vector::Boolean(
                inputs[0]
                    .booleans()?
                    .zip(inputs[1].booleans()?)
                    .map(|(a, b)| or(a, b))
                    .collect(),
            ),
            Function::IsMissing => match inputs[0].value_type() {
                ValueType::Symbol => Vector::Boolean(
                    inputs[0]
                        .symbols()?
                        .map(|s| s.is_none() as u8)
                        .collect(),
                ),
                _ => Vector::Boolean(inputs[0].numbers()?.map(|x| x.is_nan() as u8).collect()),
            },
            _ if self.num_inputs() == 2 => Vector::Double(
                inputs[0]
                    .doubles()?
                    .zip(inputs[1].doubles()?)
                    .map(|(a, b)| self.binary(a, b))
                    .collect(),
            ),
            _ => Vector::Double(inputs[0].doubles()?.map(|x| self.unary(x)).collect()),
        };
        Ok(DataVector::owned(indices.clone(), vector))
    }

    fn binary(&self, a: f64, b: f64) -> f64 {
        if a.is_nan() || b.is_nan() {
            return f64::NAN;
        }
        let res = match self {
            Function::Add => a + b,
            Function::Sub => a - b,
            Function::Mul => a * b,
            Function::Div if b == 0.0 => f64::NAN,
            Function::Div => a / b,
            Function::Min => a.min(b),
            Function::Max => a.max(b),
            _ => f64::NAN,
        };
        finite_or_missing(res)
    }

    fn unary(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let res = match self {
            Function::Neg => -x,
            Function::Abs => x.abs(),
            Function::Log if x <= 0.0 => f64::NAN,
            Function::Log => x.ln(),
            Function::Sqrt if x < 0.0 => f64::NAN,
            Function::Sqrt => x.sqrt(),
            Function::Exp => x.exp(),
            _ => f64::NAN,
        };
        finite_or_missing(res)
    }
}

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

fn finite_or_missing(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        f64::NAN
    }
}

fn greater_than(x: f64, threshold: f64) -> u8 {
    if x.is_nan() {
        tri_state::MISSING
    } else {
        tri_state::from_option(Some(x > threshold))
    }
}

fn equals(value: &Value, expected: &Value) -> u8 {
    if value.is_missing() {
        return tri_state::MISSING;
    }
    let same = match (value, expected) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Integer(_), Value::Double(_)) | (Value::Double(_), Value::Integer(_)) => {
            value.as_f64() == expected.as_f64()
        }
        _ => value == expected,
    };
    tri_state::from_option(Some(same))
}

fn not(raw: u8) -> u8 {
    match raw {
        tri_state::FALSE => tri_state::TRUE,
        tri_state::TRUE => tri_state::FALSE,
        _ => tri_state::MISSING,
    }
}

// Kleene logic: a definite false (and) or true (or) wins over missing
fn and(a: u8, b: u8) -> u8 {
    match (a, b) {
        (tri_state::FALSE, _) | (_, tri_state::FALSE) => tri_state::FALSE,
        (tri_state::TRUE, tri_state::TRUE) => tri_state::TRUE,
        _ => tri_state::MISSING,
    }
}

fn or(a: u8, b: u8) -> u8 {
    match (a, b) {
        (tri_state::TRUE, _) | (_, tri_state::TRUE) => tri_state::TRUE,
        (tri_state::FALSE, tri_state::FALSE) => tri_state::FALSE,
        _ => tri_state::MISSING,
    }
}
