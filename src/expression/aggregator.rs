// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! N-ary aggregators combining several sub-expressions per row

use crate::data::{tri_state, DataVector, IndexSet, Value, ValueType, Vector};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Row-wise reductions over a list of nodes; the output is always a double
///
/// Missing inputs are skipped; a row where every input is missing
/// aggregates to missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    Sum,
    Mean,
    Min,
    Max,
    /// Fraction of true votes among the non-missing boolean inputs
    Vote,
}

impl Aggregator {
    pub fn name(self) -> &'static str {
        match self {
            Aggregator::Sum => "sum",
            Aggregator::Mean => "mean",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::Vote => "vote",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Aggregator::Sum),
            "mean" => Some(Aggregator::Mean),
            "min" => Some(Aggregator::Min),
            "max" => Some(Aggregator::Max),
            "vote" => Some(Aggregator::Vote),
            _ => None,
        }
    }

    pub fn input_type(self) -> ValueType {
        match self {
            Aggregator::Vote => ValueType::Boolean,
            _ => ValueType::Double,
        }
    }

    pub fn accepts(self, ty: ValueType) -> bool {
        match self {
            Aggregator::Vote => ty == ValueType::Boolean,
            _ => ty.is_numeric(),
        }
    }

    pub fn output_type(self) -> ValueType {
        ValueType::Double
    }

    pub fn compute(self, inputs: &[Value]) -> Value {
        let mut acc = Accumulator::new(self);
        for input in inputs {
            acc.add(self.sample(input));
        }
        Value::double(acc.finish())
    }

    pub fn compute_samples(
        self,
        indices: &Arc<IndexSet>,
        inputs: &[DataVector],
    ) -> Result<DataVector> {
        if inputs.is_empty() {
            return Err(EngineError::EmptyAggregator(self.name().to_string()));
        }
        if let Some(bad) = inputs.iter().find(|i| !self.accepts(i.value_type())) {
            return Err(EngineError::type_mismatch(
                self.input_type(),
                bad.value_type(),
                format!("aggregator {}", self.name()),
            ));
        }

        if let Some(values) = inputs
            .iter()
            .map(|i| i.constant_value().cloned())
            .collect::<Option<Vec<Value>>>()
        {
            return Ok(DataVector::constant(
                indices.clone(),
                ValueType::Double,
                self.compute(&values),
            ));
        }

        let mut accumulators = vec![Accumulator::new(self); indices.len()];
        for input in inputs {
            debug_assert_eq!(input.len(), indices.len());
            for (acc, x) in accumulators.iter_mut().zip(input.numbers()?) {
                acc.add(x);
            }
        }
        let values = accumulators.into_iter().map(|acc| acc.finish()).collect();
        Ok(DataVector::owned(indices.clone(), Vector::Double(values)))
    }

    fn sample(self, value: &Value) -> f64 {
        match self {
            Aggregator::Vote => match value.to_tri_state() {
                tri_state::TRUE => 1.0,
                tri_state::FALSE => 0.0,
                _ => f64::NAN,
            },
            _ => value.as_f64().unwrap_or(f64::NAN),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    aggregator: Aggregator,
    value: f64,
    count: usize,
}

impl Accumulator {
    fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            value: 0.0,
            count: 0,
        }
    }

    fn add(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        self.value = match self.aggregator {
            _ if self.count == 0 => x,
            Aggregator::Min => self.value.min(x),
            Aggregator::Max => self.value.max(x),
            _ => self.value + x,
        };
        self.count += 1;
    }

    fn finish(self) -> f64 {
        match self.aggregator {
            _ if self.count == 0 => f64::NAN,
            Aggregator::Mean | Aggregator::Vote => self.value / self.count as f64,
            _ => self.value,
        }
    }
}
