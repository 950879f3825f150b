// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Terminal statistical models evaluated over named input columns

use crate::data::{DataVector, IndexSet, Table, Vector};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Model leaf of an expression; always produces a double
///
/// A model reads its inputs directly from table columns rather than from
/// child nodes. Any missing input yields a missing prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    /// `weights[0] + sum(weights[i + 1] * x[i])`
    Linear {
        inputs: Vec<String>,
        weights: Vec<f64>,
    },
    /// Linear model over inputs normalised as `(x - mean) / (3 * std_dev)`
    Perceptron {
        inputs: Vec<String>,
        weights: Vec<f64>,
        means: Vec<f64>,
        std_devs: Vec<f64>,
    },
    DecisionTree {
        inputs: Vec<String>,
        root: TreeModel,
    },
}

/// Node of a regression tree; `x[feature] > threshold` goes right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeModel {
    /// Linear model over the tree inputs, same layout as [`Model::Linear`]
    Leaf { weights: Vec<f64> },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeModel>,
        right: Box<TreeModel>,
    },
}

impl TreeModel {
    pub fn leaf(weights: Vec<f64>) -> Self {
        TreeModel::Leaf { weights }
    }

    pub fn split(feature: usize, threshold: f64, left: TreeModel, right: TreeModel) -> Self {
        TreeModel::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            TreeModel::Leaf { .. } => 1,
            TreeModel::Split { left, right, .. } => left.num_leaves() + right.num_leaves(),
        }
    }

    fn validate(&self, num_inputs: usize) -> Result<()> {
        match self {
            TreeModel::Leaf { weights } => check_weights(weights, num_inputs),
            TreeModel::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= num_inputs {
                    return Err(EngineError::InvalidModel(format!(
                        "split on feature {} of {}",
                        feature, num_inputs
                    )));
                }
                if !threshold.is_finite() {
                    return Err(EngineError::InvalidModel("non-finite split threshold".into()));
                }
                left.validate(num_inputs)?;
                right.validate(num_inputs)
            }
        }
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeModel::Leaf { weights } => return linear(weights, x),
                TreeModel::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] > *threshold { right } else { left };
                }
            }
        }
    }
}

impl Model {
    pub fn linear(inputs: Vec<String>, weights: Vec<f64>) -> Self {
        Model::Linear { inputs, weights }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Model::Linear { .. } => "linear",
            Model::Perceptron { .. } => "perceptron",
            Model::DecisionTree { .. } => "tree",
        }
    }

    /// Names of the columns read by the model, in weight order
    pub fn inputs(&self) -> &[String] {
        match self {
            Model::Linear { inputs, .. }
            | Model::Perceptron { inputs, .. }
            | Model::DecisionTree { inputs, .. } => inputs,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.inputs().len();
        if n == 0 {
            return Err(EngineError::InvalidModel(format!("{} model without inputs", self.name())));
        }
        match self {
            Model::Linear { weights, .. } => check_weights(weights, n),
            Model::Perceptron {
                weights,
                means,
                std_devs,
                ..
            } => {
                check_weights(weights, n)?;
                if means.len() != n || std_devs.len() != n {
                    return Err(EngineError::InvalidModel(format!(
                        "perceptron over {} inputs has {} means and {} deviations",
                        n,
                        means.len(),
                        std_devs.len()
                    )));
                }
                Ok(())
            }
            Model::DecisionTree { root, .. } => root.validate(n),
        }
    }

    /// Prediction for one row of inputs; NaN marks missing
    pub fn predict(&self, x: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), self.inputs().len());
        if x.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        match self {
            Model::Linear { weights, .. } => linear(weights, x),
            Model::Perceptron {
                weights,
                means,
                std_devs,
                ..
            } => {
                let normalized: Vec<f64> = x
                    .iter()
                    .zip(means.iter().zip(std_devs))
                    .map(|(&v, (&mean, &std))| {
                        if std == 0.0 {
                            0.0
                        } else {
                            (v - mean) / (3.0 * std)
                        }
                    })
                    .collect();
                linear(weights, &normalized)
            }
            Model::DecisionTree { root, .. } => root.predict(x),
        }
    }

    /// Row-wise input values, NaN for missing
    pub fn row_inputs(&self, table: &Table, row: usize) -> Result<Vec<f64>> {
        self.inputs()
            .iter()
            .map(|name| {
                let column = input_column(table, name)?;
                Ok(table.get(row, column)?.as_f64().unwrap_or(f64::NAN))
            })
            .collect()
    }

    pub fn compute_samples(&self, table: &Table, indices: &Arc<IndexSet>) -> Result<DataVector> {
        let n = indices.len();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.inputs().len());
        for name in self.inputs() {
            let data = table.data(input_column(table, name)?)?;
            let view = DataVector::cached(indices.clone(), data.clone());
            columns.push(view.numbers()?.collect());
        }

        let mut row = vec![0.0; columns.len()];
        let mut values = Vec::with_capacity(n);
        for position in 0..n {
            for (slot, column) in row.iter_mut().zip(&columns) {
                *slot = column[position];
            }
            values.push(self.predict(&row));
        }
        Ok(DataVector::owned(indices.clone(), Vector::Double(values)))
    }
}

fn input_column(table: &Table, name: &str) -> Result<usize> {
    table.find_by_name(name).ok_or_else(|| EngineError::MissingInput {
        name: name.to_string(),
    })
}

fn check_weights(weights: &[f64], num_inputs: usize) -> Result<()> {
    if weights.len() != num_inputs + 1 {
        return Err(EngineError::InvalidModel(format!(
            "{} weights for {} inputs (expected intercept plus one per input)",
            weights.len(),
            num_inputs
        )));
    }
    Ok(())
}

fn linear(weights: &[f64], x: &[f64]) -> f64 {
    let res = weights[0]
        + weights[1..]
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f64>();
    if res.is_finite() {
        res
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Value, ValueType};
    use approx::assert_relative_eq;

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> Table {
        let mut table = Table::new();
        table.add_column("a", ValueType::Double).unwrap();
        table.add_column("b", ValueType::Integer).unwrap();
        table.add_row(&[Value::Double(1.0), Value::Integer(2)]).unwrap();
        table.add_row(&[Value::Missing, Value::Integer(0)]).unwrap();
        table.add_row(&[Value::Double(3.0), Value::Integer(-1)]).unwrap();
        table
    }

    #[test]
    fn test_linear_model() {
        let model = Model::linear(inputs(&["a", "b"]), vec![0.5, 2.0, -1.0]);
        model.validate().unwrap();
        assert_relative_eq!(model.predict(&[1.0, 2.0]), 0.5);
        assert!(model.predict(&[f64::NAN, 2.0]).is_nan());

        let samples = model.compute_samples(&table(), &Arc::new(IndexSet::range(0, 3))).unwrap();
        assert_eq!(samples.get(0), Value::Double(0.5));
        assert!(samples.get(1).is_missing());
        assert_eq!(samples.get(2), Value::Double(7.5));
    }

    #[test]
    fn test_perceptron_normalisation() {
        let model = Model::Perceptron {
            inputs: inputs(&["a", "b"]),
            weights: vec![1.0, 3.0, 5.0],
            means: vec![1.0, 0.0],
            std_devs: vec![2.0, 0.0],
        };
        model.validate().unwrap();
        // (7 - 1) / 6 = 1, zero deviation normalises to 0
        assert_relative_eq!(model.predict(&[7.0, 100.0]), 4.0);
    }

    #[test]
    fn test_decision_tree() {
        let root = TreeModel::split(
            0,
            2.0,
            TreeModel::leaf(vec![-1.0, 0.0, 0.0]),
            TreeModel::split(1, 0.0, TreeModel::leaf(vec![10.0, 0.0, 0.0]), TreeModel::leaf(vec![0.0, 1.0, 1.0])),
        );
        let model = Model::DecisionTree {
            inputs: inputs(&["a", "b"]),
            root,
        };
        model.validate().unwrap();
        assert_eq!(model.predict(&[1.0, 5.0]), -1.0);
        assert_eq!(model.predict(&[3.0, -1.0]), 10.0);
        assert_eq!(model.predict(&[3.0, 1.0]), 4.0);
    }

    #[test]
    fn test_invalid_models() {
        assert!(Model::linear(inputs(&["a"]), vec![1.0]).validate().is_err());
        assert!(Model::linear(Vec::new(), vec![1.0]).validate().is_err());
        let tree = Model::DecisionTree {
            inputs: inputs(&["a"]),
            root: TreeModel::split(3, 0.0, TreeModel::leaf(vec![0.0, 0.0]), TreeModel::leaf(vec![0.0, 0.0])),
        };
        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_missing_input_column() {
        let model = Model::linear(inputs(&["zzz"]), vec![0.0, 1.0]);
        let err = model
            .compute_samples(&table(), &Arc::new(IndexSet::range(0, 3)))
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingInput { .. }));
    }
}
