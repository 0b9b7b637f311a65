//! Artifact persistence
//!
//! Two files per attribute under the store root:
//! - `<attr>vec.bin`: bincode-serialized `VectorTable`
//! - `<attr>vocab.json`: JSON array of distinct values in table order

use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::{AttributeEmbedding, VectorTable};
use crate::error::{EmbeddingError, Result};

const VEC_SUFFIX: &str = "vec.bin";
const VOCAB_SUFFIX: &str = "vocab.json";

/// Filesystem store for attribute embeddings
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed
    pub fn ensure_root(&self) -> Result<()> {
        if !self.root.as_os_str().is_empty() {
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vec_path(&self, attribute: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}{}", checked_name(attribute)?, VEC_SUFFIX)))
    }

    pub fn vocab_path(&self, attribute: &str) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}{}", checked_name(attribute)?, VOCAB_SUFFIX)))
    }

    /// Whether both files exist for the attribute
    pub fn contains(&self, attribute: &str) -> bool {
        match (self.vec_path(attribute), self.vocab_path(attribute)) {
            (Ok(vec), Ok(vocab)) => vec.is_file() && vocab.is_file(),
            _ => false,
        }
    }

    /// Write the table and the ordered value list
    pub fn save(&self, embedding: &AttributeEmbedding) -> Result<()> {
        let attribute = embedding.attribute();
        let vec_path = self.vec_path(attribute)?;
        let vocab_path = self.vocab_path(attribute)?;

        fs::write(&vec_path, bincode::serialize(embedding.table())?)?;
        fs::write(&vocab_path, serde_json::to_vec(embedding.values())?)?;

        log::debug!(
            "[{}] wrote {} and {}",
            attribute,
            vec_path.display(),
            vocab_path.display()
        );
        Ok(())
    }

    /// Read the table and value list and rebuild the value index
    pub fn load(&self, attribute: &str, null_marker: &str) -> Result<AttributeEmbedding> {
        let vec_path = self.vec_path(attribute)?;
        let vocab_path = self.vocab_path(attribute)?;

        let table: VectorTable = bincode::deserialize(&read_artifact(attribute, &vec_path)?)?;
        let values: Vec<String> = serde_json::from_slice(&read_artifact(attribute, &vocab_path)?)?;

        AttributeEmbedding::new(attribute, values, table, null_marker)
    }
}

fn read_artifact(attribute: &str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EmbeddingError::MissingArtifact {
            attribute: attribute.to_string(),
            path: path.to_path_buf(),
        },
        _ => EmbeddingError::Io(e),
    })
}

/// Attribute names become file name prefixes and must stay inside the root
fn checked_name(attribute: &str) -> Result<&str> {
    if attribute.is_empty()
        || attribute == "."
        || attribute == ".."
        || attribute.contains(['/', '\\', '\0'])
    {
        return Err(EmbeddingError::invalid_path(format!(
            "attribute name '{}' cannot be used as a file name",
            attribute
        )));
    }
    Ok(attribute)
}
