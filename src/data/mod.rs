// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tabular data: values, index sets, tables and per-node result vectors

mod data_vector;
mod index_set;
mod table;
pub mod value;
mod vector;

pub use data_vector::{DataVector, Implementation, Iter as DataVectorIter, RawIter};
pub use index_set::IndexSet;
pub use table::{ColumnKey, Table};
pub use value::{tri_state, Value, ValueType};
pub use vector::Vector;
