// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Textual form of expressions, readable back by the expression parser

use super::node::{ExprKind, ExpressionNode};
use super::{Function, Model, TreeModel};
use crate::data::Value;
use std::fmt;

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Variable { name, .. } => f.write_str(name),
            ExprKind::Constant(Value::Missing) => write!(f, "missing<{}>", self.value_type()),
            ExprKind::Constant(value) => write!(f, "{}", value),
            ExprKind::Function {
                function,
                arguments,
            } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                match function {
                    Function::GreaterThan(threshold) => write!(f, ", {})", number(*threshold)),
                    Function::Equals(value) => write!(f, ", {})", value),
                    _ => f.write_str(")"),
                }
            }
            ExprKind::Aggregator { aggregator, nodes } => {
                write!(f, "{}[", aggregator.name())?;
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", node)?;
                }
                f.write_str("]")
            }
            ExprKind::Test {
                condition,
                success,
                failure,
                missing,
            } => {
                write!(f, "({} ? {} : {}", condition, success, failure)?;
                if let Some(missing) = missing {
                    write!(f, " : {}", missing)?;
                }
                f.write_str(")")
            }
            ExprKind::Model(model) => write!(f, "{}", model),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        match self {
            Model::Linear { weights, .. } => write_list(f, weights)?,
            Model::Perceptron {
                weights,
                means,
                std_devs,
                ..
            } => {
                write_list(f, weights)?;
                f.write_str(", ")?;
                write_list(f, means)?;
                f.write_str(", ")?;
                write_list(f, std_devs)?;
            }
            Model::DecisionTree { root, .. } => write!(f, "{}", root)?,
        }
        for input in self.inputs() {
            write!(f, ", {}", input)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for TreeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeModel::Leaf { weights } => write_list(f, weights),
            TreeModel::Split {
                feature,
                threshold,
                left,
                right,
            } => write!(f, "{{{} > {} ? {} : {}}}", feature, number(*threshold), right, left),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[f64]) -> fmt::Result {
    f.write_str("[")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", number(*v))?;
    }
    f.write_str("]")
}

fn number(x: f64) -> Value {
    Value::Double(x)
}
