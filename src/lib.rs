// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! tabexpr
//!
//! Typed expression DAGs evaluated column-wise over an in-memory table, with
//! a byte-budgeted samples cache shared by the nodes of a learner's search.

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod expression;
pub mod io;

pub use cache::{CacheStats, ParallelEvaluator, SamplesCache, SortedDoubleValues};
pub use config::{CacheConfig, EngineConfig};
pub use data::{ColumnKey, DataVector, IndexSet, Table, Value, ValueType, Vector};
pub use error::{EngineError, Result};
pub use expression::{evaluate, ExecutionContext, Expr, ExprId, ExprKind, Universe};
pub use io::{load_table, parse_expression};

/// Parse `source` against `table` and evaluate it on every row
pub fn evaluate_source(source: &str, table: &Table) -> Result<DataVector> {
    let universe = Universe::new();
    let expr = parse_expression(source, table, &universe)?;
    evaluate(&expr, table)
}
