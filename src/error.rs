// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for the evaluation engine

use crate::data::ValueType;
use thiserror::Error;

/// Errors raised while building tables and expressions or evaluating them
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A variable or model input refers to a column absent from the table
    #[error("missing input: no column named '{name}' in the table")]
    MissingInput { name: String },

    /// A value or vector does not have the type the caller declared
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
        context: String,
    },

    /// A function received the wrong number of arguments
    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    /// The branches of a test do not share one result type
    #[error("test branches have incompatible types: {0} and {1}")]
    IncompatibleBranches(ValueType, ValueType),

    /// Aggregators need at least one input node
    #[error("aggregator {0} needs at least one input node")]
    EmptyAggregator(String),

    /// A model leaf was built with inconsistent parameters
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("a missing constant needs an explicit type")]
    UntypedConstant,

    #[error("duplicate column key: {0}")]
    DuplicateColumn(String),

    #[error("row has {found} value(s) but the table has {expected} column(s)")]
    RowArity { expected: usize, found: usize },

    #[error("column {index} out of range ({num_columns} column(s))")]
    ColumnOutOfRange { index: usize, num_columns: usize },

    #[error("row {index} out of range ({num_rows} row(s))")]
    RowOutOfRange { index: usize, num_rows: usize },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn type_mismatch(expected: ValueType, found: ValueType, context: impl Into<String>) -> Self {
        EngineError::TypeMismatch {
            expected,
            found,
            context: context.into(),
        }
    }
}
