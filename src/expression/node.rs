// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression DAG nodes and the universe that allocates them

use super::{Aggregator, Function, Model};
use crate::data::{Table, Value, ValueType};
use crate::error::{EngineError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of an expression node: the allocating [`Universe`] plus
/// the node's allocation index inside it
///
/// Universes draw their own id from a process-wide counter, so ids of nodes
/// built by different universes never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId {
    universe: u64,
    index: u64,
}

impl ExprId {
    pub fn new(universe: u64, index: u64) -> Self {
        Self { universe, index }
    }

    pub fn universe(self) -> u64 {
        self.universe
    }

    /// Allocation order inside the universe
    pub fn index(self) -> u64 {
        self.index
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.universe, self.index)
    }
}

static NEXT_UNIVERSE: AtomicU64 = AtomicU64::new(0);

/// Shared handle to an immutable node; sub-expressions may have many parents
pub type Expr = Arc<ExpressionNode>;

/// One node of the computation DAG
#[derive(Debug)]
pub struct ExpressionNode {
    id: ExprId,
    ty: ValueType,
    kind: ExprKind,
}

/// Closed set of node kinds
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Reads the input column called `name`
    Variable { name: String, input_index: usize },
    Constant(Value),
    Function {
        function: Function,
        arguments: Vec<Expr>,
    },
    Aggregator {
        aggregator: Aggregator,
        nodes: Vec<Expr>,
    },
    /// Ternary conditional on a tri-state boolean condition
    Test {
        condition: Expr,
        success: Expr,
        failure: Expr,
        missing: Option<Expr>,
    },
    /// Terminal statistical model reading its inputs straight from the table
    Model(Model),
}

impl ExpressionNode {
    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(_))
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Short label of the node kind, used in cache reports
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Variable { .. } => "variable",
            ExprKind::Constant(_) => "constant",
            ExprKind::Function { .. } => "function",
            ExprKind::Aggregator { .. } => "aggregator",
            ExprKind::Test { .. } => "test",
            ExprKind::Model(_) => "model",
        }
    }
}

/// Construction context: hands out node ids and records node importance
///
/// Node indices come from a per-universe atomic counter; the universe id
/// taken at construction keeps ids distinct across universes. Importance
/// lives in a side table keyed by id since nodes themselves are immutable
/// and shared.
#[derive(Debug)]
pub struct Universe {
    id: u64,
    next_id: AtomicU64,
    importance: DashMap<ExprId, f64>,
}

impl Default for Universe {
    fn default() -> Self {
        Self {
            id: NEXT_UNIVERSE.fetch_add(1, Ordering::Relaxed),
            next_id: AtomicU64::new(0),
            importance: DashMap::new(),
        }
    }
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of nodes allocated so far
    pub fn num_allocated(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    fn allocate(&self, ty: ValueType, kind: ExprKind) -> Expr {
        let id = ExprId::new(self.id, self.next_id.fetch_add(1, Ordering::Relaxed));
        Arc::new(ExpressionNode { id, ty, kind })
    }

    pub fn variable(&self, name: impl Into<String>, ty: ValueType, input_index: usize) -> Expr {
        self.allocate(
            ty,
            ExprKind::Variable {
                name: name.into(),
                input_index,
            },
        )
    }

    /// Variable typed after the table column of the same name
    pub fn variable_for(&self, table: &Table, name: &str) -> Result<Expr> {
        let column = table
            .find_by_name(name)
            .ok_or_else(|| EngineError::MissingInput {
                name: name.to_string(),
            })?;
        let ty = table
            .column_type(column)
            .ok_or(EngineError::ColumnOutOfRange {
                index: column,
                num_columns: table.num_columns(),
            })?;
        Ok(self.variable(name, ty, column))
    }

    /// Constant typed after its value; use [`Self::missing`] for missing constants
    pub fn constant(&self, value: impl Into<Value>) -> Result<Expr> {
        let value = value.into();
        let ty = value.value_type().ok_or(EngineError::UntypedConstant)?;
        Ok(self.allocate(ty, ExprKind::Constant(value)))
    }

    /// Constant of an explicit type; integers widen to doubles
    pub fn typed_constant(&self, value: impl Into<Value>, ty: ValueType) -> Result<Expr> {
        let value = value.into();
        if !value.fits(ty) {
            return Err(EngineError::type_mismatch(
                ty,
                value.value_type().unwrap_or(ty),
                "constant",
            ));
        }
        let value = match (&value, ty) {
            (Value::Integer(i), ValueType::Double) => Value::Double(*i as f64),
            _ => value,
        };
        Ok(self.allocate(ty, ExprKind::Constant(value)))
    }

    pub fn missing(&self, ty: ValueType) -> Expr {
        self.allocate(ty, ExprKind::Constant(Value::Missing))
    }

    /// Function application, type-checked against the function signature
    pub fn function(&self, function: Function, arguments: Vec<Expr>) -> Result<Expr> {
        let types: Vec<ValueType> = arguments.iter().map(|a| a.value_type()).collect();
        function.check_arguments(&types)?;
        let ty = function.output_type();
        Ok(self.allocate(ty, ExprKind::Function { function, arguments }))
    }

    pub fn aggregator(&self, aggregator: Aggregator, nodes: Vec<Expr>) -> Result<Expr> {
        if nodes.is_empty() {
            return Err(EngineError::EmptyAggregator(aggregator.name().to_string()));
        }
        for node in &nodes {
            if !aggregator.accepts(node.value_type()) {
                return Err(EngineError::type_mismatch(
                    aggregator.input_type(),
                    node.value_type(),
                    format!("aggregator {}", aggregator.name()),
                ));
            }
        }
        Ok(self.allocate(aggregator.output_type(), ExprKind::Aggregator { aggregator, nodes }))
    }

    /// Ternary test; the result type is the success branch type
    pub fn test(
        &self,
        condition: Expr,
        success: Expr,
        failure: Expr,
        missing: Option<Expr>,
    ) -> Result<Expr> {
        if condition.value_type() != ValueType::Boolean {
            return Err(EngineError::type_mismatch(
                ValueType::Boolean,
                condition.value_type(),
                "test condition",
            ));
        }
        let ty = success.value_type();
        for branch in std::iter::once(&failure).chain(missing.as_ref()) {
            if branch.value_type() != ty {
                return Err(EngineError::IncompatibleBranches(ty, branch.value_type()));
            }
        }
        Ok(self.allocate(
            ty,
            ExprKind::Test {
                condition,
                success,
                failure,
                missing,
            },
        ))
    }

    pub fn model(&self, model: Model) -> Result<Expr> {
        model.validate()?;
        Ok(self.allocate(ValueType::Double, ExprKind::Model(model)))
    }

    /// Accumulate `delta` into `expr` and every node below it
    ///
    /// Shared sub-expressions receive the increment once per occurrence.
    pub fn add_importance(&self, expr: &Expr, delta: f64) {
        debug_assert!(delta.is_finite(), "importance delta must be finite");
        *self.importance.entry(expr.id()).or_insert(0.0) += delta;
        for child in expr.sub_nodes() {
            self.add_importance(child, delta);
        }
    }

    pub fn importance(&self, id: ExprId) -> f64 {
        self.importance.get(&id).map_or(0.0, |v| *v)
    }

    pub fn set_importance(&self, id: ExprId, importance: f64) {
        debug_assert!(importance.is_finite());
        self.importance.insert(id, importance);
    }

    /// Copy of `node` with the same payload but new children
    pub(crate) fn rebuild(&self, node: &Expr, children: Vec<Expr>) -> Result<Expr> {
        match node.kind() {
            ExprKind::Function { function, .. } => self.function(function.clone(), children),
            ExprKind::Aggregator { aggregator, .. } => self.aggregator(*aggregator, children),
            ExprKind::Test { missing, .. } => {
                let mut it = children.into_iter();
                match (it.next(), it.next(), it.next()) {
                    (Some(condition), Some(success), Some(failure)) => {
                        let missing_branch = if missing.is_some() { it.next() } else { None };
                        self.test(condition, success, failure, missing_branch)
                    }
                    _ => Err(EngineError::Arity {
                        function: "test".to_string(),
                        expected: 3,
                        found: node.num_sub_nodes(),
                    }),
                }
            }
            _ => Ok(node.clone()),
        }
    }
}
