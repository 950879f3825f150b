// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression DAG: node kinds, construction, evaluation and structure

mod aggregator;
mod display;
mod evaluator;
mod function;
mod model;
mod node;
mod structure;

pub use aggregator::Aggregator;
pub use evaluator::{evaluate, ExecutionContext};
pub use function::Function;
pub use model::{Model, TreeModel};
pub use node::{Expr, ExprId, ExprKind, ExpressionNode, Universe};
pub use test::{dispatch_indices, Partition};
