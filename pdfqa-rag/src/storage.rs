//! On-disk layout for uploads, per-document artifacts and the registry.
//!
//! ```text
//! <root>/registry.json                      name -> DocumentMetadata
//! <root>/uploads/<name>                     original PDF bytes
//! <root>/embeddings/<name>.embeddings.json  embedding matrix, one row per chunk
//! <root>/embeddings/<name>.chunks.json      chunk metadata, same order as the rows
//! ```
//!
//! Files are written to a temporary sibling and renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Chunk, DocumentMetadata};
use crate::error::{RagError, Result};
use crate::index::DocumentIndex;

const REGISTRY_FILE: &str = "registry.json";
const UPLOADS_DIR: &str = "uploads";
const EMBEDDINGS_DIR: &str = "embeddings";

#[derive(Serialize, Deserialize)]
struct MatrixFile {
    dimensions: usize,
    rows: Vec<Vec<f32>>,
}

/// Check that `name` is usable both as a display name and as a file name.
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] if the name lacks a `.pdf` suffix,
/// has nothing before the suffix, or is not a single path component.
pub fn check_document_name(name: &str) -> Result<()> {
    if !name.ends_with(".pdf") {
        return Err(RagError::InvalidInput(format!("'{name}': only PDF files are allowed")));
    }
    if name.len() == ".pdf".len() {
        return Err(RagError::InvalidInput("file name is empty".to_string()));
    }
    let single_component = Path::new(name).file_name().is_some_and(|n| n == name);
    if !single_component || name.contains(['/', '\\']) || name.chars().any(char::is_control) {
        return Err(RagError::InvalidInput(format!("'{name}': file name is not allowed")));
    }
    Ok(())
}

/// Paths of every artifact under one storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Use `root` as the storage directory, creating it and its subdirectories.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Self { root: root.into() };
        for dir in [layout.uploads_dir(), layout.embeddings_dir()] {
            fs::create_dir_all(&dir).map_err(|e| storage_error(&dir, &e))?;
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.root.join(EMBEDDINGS_DIR)
    }

    pub fn upload_path(&self, name: &str) -> PathBuf {
        self.uploads_dir().join(name)
    }

    pub fn matrix_path(&self, name: &str) -> PathBuf {
        self.embeddings_dir().join(format!("{name}.embeddings.json"))
    }

    pub fn chunks_path(&self, name: &str) -> PathBuf {
        self.embeddings_dir().join(format!("{name}.chunks.json"))
    }

    /// Save the original upload bytes.
    pub fn write_upload(&self, name: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.upload_path(name), bytes)
    }

    /// Persist both artifacts of a document index.
    pub fn write_index(&self, name: &str, index: &DocumentIndex) -> Result<()> {
        let matrix =
            MatrixFile { dimensions: index.dimensions(), rows: index.embedding_rows() };
        write_json(&self.matrix_path(name), &matrix)?;
        write_json(&self.chunks_path(name), &index.chunks())?;
        debug!(document.name = name, rows = index.len(), "wrote index artifacts");
        Ok(())
    }

    /// Load a document index from its two artifacts.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if either artifact is missing.
    /// - [`RagError::DimensionMismatch`] if the stored dimension differs from `expected_dimensions`.
    /// - [`RagError::CorruptIndex`] if the artifacts disagree with each other.
    pub fn read_index(&self, name: &str, expected_dimensions: usize) -> Result<DocumentIndex> {
        let matrix_path = self.matrix_path(name);
        let chunks_path = self.chunks_path(name);
        if !matrix_path.exists() || !chunks_path.exists() {
            return Err(RagError::NotFound(format!("index data for '{name}'")));
        }

        let matrix: MatrixFile = read_json(&matrix_path)?;
        let chunks: Vec<Chunk> = read_json(&chunks_path)?;

        if matrix.dimensions != expected_dimensions {
            return Err(RagError::DimensionMismatch {
                expected: expected_dimensions,
                actual: matrix.dimensions,
            });
        }
        if let Some(stray) = chunks.iter().find(|c| c.document_name != name) {
            return Err(RagError::CorruptIndex(format!(
                "chunk of '{}' stored under '{name}'",
                stray.document_name
            )));
        }

        DocumentIndex::new(matrix.dimensions, chunks, matrix.rows)
    }

    /// Remove the upload and both index artifacts. Missing files are ignored.
    ///
    /// Names that fail [`check_document_name`] are rejected before any file is touched.
    pub fn remove_document(&self, name: &str) -> Result<()> {
        check_document_name(name)?;
        for path in [self.matrix_path(name), self.chunks_path(name), self.upload_path(name)] {
            remove_if_exists(&path)?;
        }
        Ok(())
    }

    /// Load the registry, or an empty one if it has never been written.
    pub fn read_registry(&self) -> Result<BTreeMap<String, DocumentMetadata>> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&path)
    }

    pub fn write_registry(&self, registry: &BTreeMap<String, DocumentMetadata>) -> Result<()> {
        write_json(&self.registry_path(), registry)
    }
}

fn storage_error(path: &Path, e: &io::Error) -> RagError {
    RagError::StorageError { path: path.display().to_string(), message: e.to_string() }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|e| storage_error(&tmp, &e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        storage_error(path, &e)
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    write_atomic(path, &bytes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RagError::NotFound(path.display().to_string()),
        _ => storage_error(path, &e),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        RagError::CorruptIndex(format!("failed to parse {}: {e}", path.display()))
    })
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error(path, &e)),
    }
}
