// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - expression parsing and table import/export

mod parser;
mod table_io;

pub use parser::parse_expression;
pub use table_io::{load_table, save_table, table_from_json, table_to_json};
