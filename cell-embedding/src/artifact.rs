//! Attribute embedding artifacts
//!
//! An artifact is the vector table for one attribute together with the
//! index from distinct cell values to table rows. The last table row is
//! always the null sentinel.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Component value of the null sentinel row
pub const NULL_SENTINEL: f32 = -1.0;

/// Cell vectors followed by the null sentinel row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorTable {
    dimension: usize,
    rows: Vec<Vec<f32>>,
}

impl VectorTable {
    /// Build a table from cell vectors and append the sentinel row
    pub fn with_sentinel(dimension: usize, mut rows: Vec<Vec<f32>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dimension) {
            return Err(EmbeddingError::configuration(format!(
                "row {} has dimension {}, expected {}",
                i,
                row.len(),
                dimension
            )));
        }
        rows.push(vec![NULL_SENTINEL; dimension]);
        Ok(Self { dimension, rows })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows, sentinel included
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Index of the null sentinel row
    pub fn null_index(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Whether the trailing row is a well-formed sentinel
    pub fn has_sentinel(&self) -> bool {
        self.rows
            .last()
            .map(|row| row.len() == self.dimension && row.iter().all(|v| *v == NULL_SENTINEL))
            .unwrap_or(false)
    }
}

/// Distinct cell value -> row in the attribute's `VectorTable`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueIndex {
    index: HashMap<String, usize>,
}

impl ValueIndex {
    /// Enumerate `values` in order and map `null_marker` to `null_index`
    pub fn build(values: &[String], null_marker: &str, null_index: usize) -> Result<Self> {
        let mut index = HashMap::with_capacity(values.len() + 1);
        for (row, value) in values.iter().enumerate() {
            if index.insert(value.clone(), row).is_some() {
                return Err(EmbeddingError::configuration(format!(
                    "duplicate value '{}' in value list",
                    value
                )));
            }
        }
        index.insert(null_marker.to_string(), null_index);
        Ok(Self { index })
    }

    pub fn get(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Number of keys, null marker included
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Built or loaded embedding of one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEmbedding {
    attribute: String,
    /// Distinct values in table order
    values: Vec<String>,
    table: VectorTable,
    index: ValueIndex,
    null_marker: String,
}

impl AttributeEmbedding {
    /// Assemble from the table and its ordered value list
    ///
    /// `table` must hold exactly one row per value plus the sentinel.
    pub fn new(
        attribute: impl Into<String>,
        values: Vec<String>,
        table: VectorTable,
        null_marker: &str,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if table.len() != values.len() + 1 || !table.has_sentinel() {
            return Err(EmbeddingError::corrupt(
                attribute,
                format!(
                    "{} values but {} table rows (expected values + sentinel)",
                    values.len(),
                    table.len()
                ),
            ));
        }
        if let Some((i, row)) = table
            .rows()
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != table.dimension())
        {
            return Err(EmbeddingError::corrupt(
                attribute,
                format!(
                    "row {} has dimension {}, expected {}",
                    i,
                    row.len(),
                    table.dimension()
                ),
            ));
        }
        let index = ValueIndex::build(&values, null_marker, table.null_index())?;
        Ok(Self {
            attribute,
            values,
            table,
            index,
            null_marker: null_marker.to_string(),
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn table(&self) -> &VectorTable {
        &self.table
    }

    pub fn index(&self) -> &ValueIndex {
        &self.index
    }

    pub fn null_marker(&self) -> &str {
        &self.null_marker
    }

    pub fn dimension(&self) -> usize {
        self.table.dimension()
    }

    /// Vector of a single value
    pub fn vector(&self, value: &str) -> Result<&[f32]> {
        self.index
            .get(value)
            .and_then(|row| self.table.row(row))
            .ok_or_else(|| EmbeddingError::lookup(&self.attribute, value))
    }

    /// Stacked vectors for `values`, in input order
    ///
    /// Fails on the first value that is not in the index.
    pub fn lookup<S: AsRef<str>>(&self, values: &[S]) -> Result<Vec<Vec<f32>>> {
        values
            .iter()
            .map(|value| self.vector(value.as_ref()).map(<[f32]>::to_vec))
            .collect()
    }
}
