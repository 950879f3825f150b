// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Columnar, row-aligned tabular storage

use super::{IndexSet, Value, ValueType, Vector};
use crate::error::{EngineError, Result};
use crate::expression::ExprId;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// Stable lookup key of a column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Name(String),
    /// Pre-computed values of one expression node
    Expression(ExprId),
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::Name(name.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(name: String) -> Self {
        ColumnKey::Name(name)
    }
}

impl From<ExprId> for ColumnKey {
    fn from(id: ExprId) -> Self {
        ColumnKey::Expression(id)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => f.write_str(name),
            ColumnKey::Expression(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    key: ColumnKey,
    data: Arc<Vector>,
}

/// Ordered collection of named, typed columns sharing one row count
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    keys: AHashMap<ColumnKey, usize>,
    num_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; existing rows receive missing values
    pub fn add_column(&mut self, key: impl Into<ColumnKey>, ty: ValueType) -> Result<usize> {
        let key = key.into();
        if self.keys.contains_key(&key) {
            return Err(EngineError::DuplicateColumn(key.to_string()));
        }
        let index = self.columns.len();
        self.keys.insert(key.clone(), index);
        self.columns.push(Column {
            key,
            data: Arc::new(Vector::new(ty, self.num_rows)),
        });
        Ok(index)
    }

    /// Append one row; `values` follow column order
    pub fn add_row(&mut self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(EngineError::RowArity {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(values) {
            if !value.fits(column.data.value_type()) {
                return Err(EngineError::type_mismatch(
                    column.data.value_type(),
                    value.value_type().unwrap_or(column.data.value_type()),
                    format!("column '{}'", column.key),
                ));
            }
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            Arc::make_mut(&mut column.data).push(value)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Append one row given only its present `(column, value)` pairs
    pub fn add_sparse_row(&mut self, values: &[(usize, Value)]) -> Result<()> {
        let mut row = vec![Value::Missing; self.columns.len()];
        for (column, value) in values {
            let slot = row.get_mut(*column).ok_or(EngineError::ColumnOutOfRange {
                index: *column,
                num_columns: self.columns.len(),
            })?;
            *slot = value.clone();
        }
        self.add_row(&row)
    }

    /// Store the full-table values of an expression node as a column
    pub fn set_expression_column(&mut self, id: ExprId, values: Vector) -> Result<usize> {
        if values.len() != self.num_rows {
            return Err(EngineError::RowArity {
                expected: self.num_rows,
                found: values.len(),
            });
        }
        let key = ColumnKey::Expression(id);
        if let Some(&index) = self.keys.get(&key) {
            self.columns[index].data = Arc::new(values);
            return Ok(index);
        }
        let index = self.columns.len();
        self.keys.insert(key.clone(), index);
        self.columns.push(Column {
            key,
            data: Arc::new(values),
        });
        Ok(index)
    }

    pub fn data(&self, column: usize) -> Result<&Arc<Vector>> {
        self.columns
            .get(column)
            .map(|c| &c.data)
            .ok_or(EngineError::ColumnOutOfRange {
                index: column,
                num_columns: self.columns.len(),
            })
    }

    pub fn find_column(&self, key: &ColumnKey) -> Option<usize> {
        self.keys.get(key).copied()
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.find_column(&ColumnKey::Name(name.to_string()))
    }

    pub fn column_key(&self, column: usize) -> Option<&ColumnKey> {
        self.columns.get(column).map(|c| &c.key)
    }

    pub fn column_type(&self, column: usize) -> Option<ValueType> {
        self.columns.get(column).map(|c| c.data.value_type())
    }

    /// Iterate `(key, type)` in column order
    pub fn schema(&self) -> impl Iterator<Item = (&ColumnKey, ValueType)> + '_ {
        self.columns.iter().map(|c| (&c.key, c.data.value_type()))
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, row: usize, column: usize) -> Result<Value> {
        self.check_row(row)?;
        Ok(self.data(column)?.get(row))
    }

    pub fn row(&self, row: usize) -> Result<Vec<Value>> {
        self.check_row(row)?;
        Ok(self.columns.iter().map(|c| c.data.get(row)).collect())
    }

    /// Index set covering every current row
    pub fn all_indices(&self) -> Arc<IndexSet> {
        Arc::new(IndexSet::range(0, self.num_rows))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row < self.num_rows {
            Ok(())
        } else {
            Err(EngineError::RowOutOfRange {
                index: row,
                num_rows: self.num_rows,
            })
        }
    }
}
