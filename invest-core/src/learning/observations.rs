//! Observation tables: one row per (company, period), columns named after
//! chance nodes, `None` for a missing cell.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};

/// Cell spellings read as missing.
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "?"];

/// Rectangular table of discrete observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ObservationTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row in column order.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::LearningData(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row.into_iter().map(clean_cell).collect());
        Ok(())
    }

    /// Append a row given as (column, value) pairs. Unknown columns are added,
    /// with earlier rows missing in them.
    pub fn push_record<K, V>(&mut self, record: impl IntoIterator<Item = (K, Option<V>)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut row = vec![None; self.columns.len()];
        for (column, value) in record {
            let index = match self.column_index(column.as_ref()) {
                Some(i) => i,
                None => {
                    self.columns.push(column.as_ref().to_string());
                    self.rows.iter_mut().for_each(|r| r.push(None));
                    row.push(None);
                    self.columns.len() - 1
                }
            };
            row[index] = clean_cell(value.map(Into::into));
        }
        self.rows.push(row);
    }

    /// Build from a JSON array of flat objects. Strings, numbers and booleans
    /// are taken as labels; null and missing markers are missing cells.
    pub fn from_json(value: &Value) -> Result<Self> {
        let records = value
            .as_array()
            .ok_or_else(|| Error::LearningData("expected a JSON array of records".into()))?;
        let mut table = Self::default();
        for (i, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                Error::LearningData(format!("record {i} is not a JSON object"))
            })?;
            table.push_record(object.iter().map(|(k, v)| (k.as_str(), cell_from_json(v))));
        }
        Ok(table)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| Error::LearningData(format!("invalid observation JSON: {e}")))?;
        Self::from_json(&value)
    }

    /// Read a JSON array of records from a file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let value: Value = invest_common::util::read_json(path)
            .map_err(|e| Error::LearningData(e.to_string()))?;
        Self::from_json(&value)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let c = self.column_index(column)?;
        self.rows.get(row)?.get(c)?.as_deref()
    }

    /// Copy keeping only the named columns, in the given order.
    pub fn select(&self, columns: &[&str]) -> Self {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        Self {
            columns: indices.iter().map(|i| self.columns[*i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|i| r[*i].clone()).collect())
                .collect(),
        }
    }

    /// Blank a cell.
    pub fn clear_cell(&mut self, row: usize, column: &str) {
        if let Some(c) = self.column_index(column) {
            if let Some(r) = self.rows.get_mut(row) {
                r[c] = None;
            }
        }
    }

    /// Append every row of another table, aligning columns by name.
    pub fn extend(&mut self, other: &ObservationTable) {
        for row in &other.rows {
            self.push_record(other.columns.iter().zip(row.iter().cloned()));
        }
    }
}

fn clean_cell(cell: Option<String>) -> Option<String> {
    cell.and_then(|v| {
        let trimmed = v.trim();
        if MISSING_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn cell_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
