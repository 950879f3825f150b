// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Vectorised and row-wise evaluation of expression nodes

use super::node::{Expr, ExprKind, ExpressionNode};
use super::test;
use crate::cache::SamplesCache;
use crate::data::{ColumnKey, DataVector, IndexSet, Table, Value};
use crate::error::{EngineError, Result};
use std::sync::Arc;

/// Everything an evaluation needs besides the index set
///
/// Carries the input table and, optionally, the cache sub-expressions
/// should go through.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    table: &'a Table,
    cache: Option<&'a SamplesCache>,
}

impl<'a> ExecutionContext<'a> {
    /// Direct evaluation with no caching
    pub fn new(table: &'a Table) -> Self {
        Self { table, cache: None }
    }

    pub fn with_cache(table: &'a Table, cache: &'a SamplesCache) -> Self {
        Self {
            table,
            cache: Some(cache),
        }
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn cache(&self) -> Option<&'a SamplesCache> {
        self.cache
    }
}

impl ExpressionNode {
    /// Values of this node over `indices`, going through the table's
    /// expression columns and the cache when available
    pub fn compute(
        self: &Arc<Self>,
        ctx: &ExecutionContext<'_>,
        indices: &Arc<IndexSet>,
    ) -> Result<DataVector> {
        if let Some(samples) = self.table_samples(ctx.table, indices) {
            return samples;
        }
        match ctx.cache {
            Some(cache) => cache.get_samples(self, indices),
            None => self.compute_samples(ctx, indices),
        }
    }

    /// Pre-computed values stored in the table under this node's id
    pub(crate) fn table_samples(
        &self,
        table: &Table,
        indices: &Arc<IndexSet>,
    ) -> Option<Result<DataVector>> {
        let column = table.find_column(&ColumnKey::Expression(self.id()))?;
        Some(
            table
                .data(column)
                .map(|data| DataVector::cached(indices.clone(), data.clone())),
        )
    }

    /// Evaluate this node's own definition; children still go through
    /// [`Self::compute`]
    pub fn compute_samples(
        self: &Arc<Self>,
        ctx: &ExecutionContext<'_>,
        indices: &Arc<IndexSet>,
    ) -> Result<DataVector> {
        match self.kind() {
            ExprKind::Variable { name, .. } => {
                let column = self.variable_column(ctx.table, name)?;
                let data = ctx.table.data(column)?;
                Ok(DataVector::cached(indices.clone(), data.clone()))
            }
            ExprKind::Constant(value) => Ok(DataVector::constant(
                indices.clone(),
                self.value_type(),
                value.clone(),
            )),
            ExprKind::Function {
                function,
                arguments,
            } => {
                let inputs = compute_all(arguments, ctx, indices)?;
                function.compute_samples(indices, &inputs)
            }
            ExprKind::Aggregator { aggregator, nodes } => {
                let inputs = compute_all(nodes, ctx, indices)?;
                aggregator.compute_samples(indices, &inputs)
            }
            ExprKind::Test {
                condition,
                success,
                failure,
                missing,
            } => test::compute_samples(
                self.value_type(),
                [failure, success],
                missing.as_ref(),
                condition,
                ctx,
                indices,
            ),
            ExprKind::Model(model) => model.compute_samples(ctx.table, indices),
        }
    }

    /// Value of this node on a single row, straight from its definition
    ///
    /// Ignores caches and expression columns; serves as the reference the
    /// vectorised path is checked against.
    pub fn evaluate_row(&self, table: &Table, row: usize) -> Result<Value> {
        match self.kind() {
            ExprKind::Variable { name, .. } => {
                let column = self.variable_column(table, name)?;
                table.get(row, column)
            }
            ExprKind::Constant(value) => Ok(value.clone()),
            ExprKind::Function {
                function,
                arguments,
            } => {
                let inputs = arguments
                    .iter()
                    .map(|a| a.evaluate_row(table, row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(function.compute(&inputs))
            }
            ExprKind::Aggregator { aggregator, nodes } => {
                let inputs = nodes
                    .iter()
                    .map(|n| n.evaluate_row(table, row))
                    .collect::<Result<Vec<_>>>()?;
                Ok(aggregator.compute(&inputs))
            }
            ExprKind::Test {
                condition,
                success,
                failure,
                missing,
            } => match condition.evaluate_row(table, row)?.as_bool() {
                Some(true) => success.evaluate_row(table, row),
                Some(false) => failure.evaluate_row(table, row),
                None => match missing {
                    Some(branch) => branch.evaluate_row(table, row),
                    None => Ok(Value::Missing),
                },
            },
            ExprKind::Model(model) => {
                let x = model.row_inputs(table, row)?;
                Ok(Value::double(model.predict(&x)))
            }
        }
    }

    fn variable_column(&self, table: &Table, name: &str) -> Result<usize> {
        let column = table
            .find_by_name(name)
            .ok_or_else(|| EngineError::MissingInput {
                name: name.to_string(),
            })?;
        let found = table
            .column_type(column)
            .ok_or(EngineError::ColumnOutOfRange {
                index: column,
                num_columns: table.num_columns(),
            })?;
        if found != self.value_type() {
            return Err(EngineError::type_mismatch(
                self.value_type(),
                found,
                format!("variable '{}'", name),
            ));
        }
        Ok(column)
    }
}

fn compute_all(
    nodes: &[Expr],
    ctx: &ExecutionContext<'_>,
    indices: &Arc<IndexSet>,
) -> Result<Vec<DataVector>> {
    nodes.iter().map(|n| n.compute(ctx, indices)).collect()
}

/// Evaluate `expr` on every row of `table` without caching
pub fn evaluate(expr: &Expr, table: &Table) -> Result<DataVector> {
    expr.compute(&ExecutionContext::new(table), &table.all_indices())
}
