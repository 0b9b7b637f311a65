//! Dataset collaborator
//!
//! The engine only needs to know which attributes are textual and what
//! their raw cell values are.

use std::collections::HashMap;

use crate::error::{EmbeddingError, Result};

/// Read-only view of a tabular dataset
pub trait TabularSource: Sync {
    /// Textual attributes to embed, in a stable order
    fn to_embed(&self) -> Vec<String>;

    /// Raw cell values of an attribute, in row order
    fn column(&self, attribute: &str) -> Result<Vec<String>>;
}

/// Column-oriented dataset held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    order: Vec<String>,
    columns: HashMap<String, Vec<String>>,
    textual: Vec<String>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a textual column
    pub fn with_text_column<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let name = name.into();
        self.textual.push(name.clone());
        self.insert(name, values);
        self
    }

    /// Add a column that is not embedded
    pub fn with_column<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.insert(name.into(), values);
        self
    }

    /// All column names in insertion order
    pub fn columns(&self) -> &[String] {
        &self.order
    }

    fn insert<S: Into<String>>(&mut self, name: String, values: impl IntoIterator<Item = S>) {
        if !self.columns.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.columns
            .insert(name, values.into_iter().map(Into::into).collect());
    }
}

impl TabularSource for InMemoryDataset {
    fn to_embed(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.textual
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    fn column(&self, attribute: &str) -> Result<Vec<String>> {
        self.columns
            .get(attribute)
            .cloned()
            .ok_or_else(|| EmbeddingError::UnknownAttribute(attribute.to_string()))
    }
}
