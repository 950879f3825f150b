// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! JSON table import and export
//!
//! Layout: `{"columns": [{"name": "x", "type": "double"}], "rows": [[1.5]]}`
//! with `null` for missing cells. Only name-keyed columns are exported.

use crate::data::{ColumnKey, Table, Value, ValueType};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct TableDocument {
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    rows: Vec<Vec<Json>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnSpec {
    name: String,
    #[serde(rename = "type")]
    ty: ValueType,
}

/// Build a table from its JSON text
pub fn table_from_json(text: &str) -> Result<Table> {
    let document: TableDocument =
        serde_json::from_str(text).context("Failed to parse table JSON")?;

    let mut table = Table::new();
    for column in &document.columns {
        table.add_column(column.name.as_str(), column.ty)?;
    }
    for (index, row) in document.rows.iter().enumerate() {
        if row.len() != document.columns.len() {
            bail!(
                "row {} has {} cell(s), expected {}",
                index,
                row.len(),
                document.columns.len()
            );
        }
        let values = row
            .iter()
            .zip(&document.columns)
            .map(|(cell, column)| {
                cell_value(cell, column.ty)
                    .with_context(|| format!("row {}, column '{}'", index, column.name))
            })
            .collect::<Result<Vec<Value>>>()?;
        table.add_row(&values)?;
    }
    Ok(table)
}

/// Render the named columns of a table as JSON
pub fn table_to_json(table: &Table) -> Result<String> {
    let columns: Vec<(usize, ColumnSpec)> = table
        .schema()
        .enumerate()
        .filter_map(|(index, (key, ty))| match key {
            ColumnKey::Name(name) => Some((
                index,
                ColumnSpec {
                    name: name.clone(),
                    ty,
                },
            )),
            ColumnKey::Expression(_) => None,
        })
        .collect();

    let mut rows = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let cells = columns
            .iter()
            .map(|(index, _)| table.get(row, *index).map(|v| json_value(&v)))
            .collect::<crate::error::Result<Vec<Json>>>()?;
        rows.push(cells);
    }

    let document = TableDocument {
        columns: columns.into_iter().map(|(_, column)| column).collect(),
        rows,
    };
    serde_json::to_string_pretty(&document).context("Failed to serialize table")
}

/// Load a JSON table file
pub fn load_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read table file: {:?}", path))?;
    table_from_json(&text).with_context(|| format!("Failed to load table file: {:?}", path))
}

/// Write the named columns of a table to a JSON file
pub fn save_table(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = table_to_json(table)?;
    fs::write(path, text).with_context(|| format!("Failed to write table file: {:?}", path))
}

fn cell_value(cell: &Json, ty: ValueType) -> Result<Value> {
    let value = match (cell, ty) {
        (Json::Null, _) => Value::Missing,
        (Json::Bool(b), ValueType::Boolean) => Value::Boolean(*b),
        (Json::Number(n), ValueType::Integer) => Value::Integer(
            n.as_i64()
                .ok_or_else(|| anyhow!("{} is not an integer", n))?,
        ),
        (Json::Number(n), ValueType::Double) => {
            Value::double(n.as_f64().ok_or_else(|| anyhow!("{} is not a number", n))?)
        }
        (Json::String(s), ValueType::Symbol) => Value::symbol(s),
        (other, ty) => bail!("cannot store {} in a {} column", other, ty),
    };
    Ok(value)
}

fn json_value(value: &Value) -> Json {
    match value {
        Value::Missing => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Double(d) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Value::Symbol(s) => Json::String(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "columns": [
            {"name": "x", "type": "double"},
            {"name": "flag", "type": "boolean"},
            {"name": "label", "type": "symbol"},
            {"name": "count", "type": "integer"}
        ],
        "rows": [
            [1.5, true, "a", 3],
            [null, false, null, -1],
            [2, null, "b", null]
        ]
    }"#;

    #[test]
    fn test_load_sample() {
        let table = table_from_json(SAMPLE).unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 4);
        assert!(table.get(1, 0).unwrap().is_missing());
        assert_eq!(table.get(2, 0).unwrap(), Value::Double(2.0));
        assert_eq!(table.get(0, 2).unwrap(), Value::symbol("a"));
        assert_eq!(table.get(1, 3).unwrap(), Value::Integer(-1));
    }

    #[test]
    fn test_bad_cells_are_reported() {
        let text = r#"{"columns": [{"name": "n", "type": "integer"}], "rows": [[1.5]]}"#;
        let err = table_from_json(text).unwrap_err();
        assert!(format!("{:#}", err).contains("row 0"));

        let ragged = r#"{"columns": [{"name": "n", "type": "integer"}], "rows": [[1, 2]]}"#;
        assert!(table_from_json(ragged).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("table.json");
        let table = table_from_json(SAMPLE).unwrap();
        save_table(&table, &path).unwrap();

        let loaded = load_table(&path).unwrap();
        assert_eq!(loaded.num_rows(), table.num_rows());
        for row in 0..table.num_rows() {
            assert_eq!(loaded.row(row).unwrap(), table.row(row).unwrap());
        }
    }
}
