//! The document store: registry of documents and their indexes.
//!
//! [`DocumentStore`] owns the name → metadata registry behind a
//! `tokio::sync::RwLock`. Every mutation (reserve, commit, abort, delete)
//! takes the write lock for its whole duration, including the artifact I/O,
//! so readers observe a document either fully present or fully absent.
//! The I/O itself runs on the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{DocumentMetadata, DocumentStatus};
use crate::error::{RagError, Result};
use crate::index::DocumentIndex;
use crate::storage::{StorageLayout, check_document_name};

#[derive(Debug)]
struct Entry {
    metadata: DocumentMetadata,
    index: Option<Arc<DocumentIndex>>,
}

impl Entry {
    fn unloaded(metadata: DocumentMetadata) -> Self {
        Self { metadata, index: None }
    }
}

/// File-backed registry of documents keyed by display name.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{DocumentStore, StorageLayout};
///
/// let store = DocumentStore::open(StorageLayout::create("data")?, 384).await?;
/// let id = store.add("manual.pdf", 12, index).await?;
/// let index = store.get_chunks_and_embeddings("manual.pdf").await?;
/// ```
#[derive(Debug)]
pub struct DocumentStore {
    layout: StorageLayout,
    dimensions: usize,
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl DocumentStore {
    /// Open the store rooted at `layout`, loading the persisted registry.
    ///
    /// Entries left in `processing` by an interrupted upload are marked `error`.
    pub async fn open(layout: StorageLayout, dimensions: usize) -> Result<Self> {
        let mut registry = run_blocking(&layout, |l| l.read_registry()).await?;

        let mut recovered = 0usize;
        for (name, metadata) in registry.iter_mut() {
            if metadata.status == DocumentStatus::Processing {
                warn!(document.name = %name, "upload was interrupted; marking document as error");
                metadata.status = DocumentStatus::Error;
                recovered += 1;
            }
        }
        let registry = if recovered > 0 {
            run_blocking(&layout, move |l| l.write_registry(&registry).map(|()| registry)).await?
        } else {
            registry
        };

        info!(root = %layout.root().display(), documents = registry.len(), "opened document store");

        let entries = registry.into_iter().map(|(name, meta)| (name, Entry::unloaded(meta))).collect();
        Ok(Self { layout, dimensions, entries: RwLock::new(entries) })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Dimensionality every stored matrix must have.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Register `name` in status `processing` and return its new id.
    ///
    /// A previous entry in status `error` is replaced and its leftover
    /// artifacts are removed.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `name` is not a usable document name.
    /// - [`RagError::DuplicateName`] if the name is `processing` or `ready`.
    pub async fn reserve(&self, name: &str) -> Result<String> {
        check_document_name(name)?;
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(name) {
            if existing.metadata.status != DocumentStatus::Error {
                return Err(RagError::DuplicateName(name.to_string()));
            }
            let owned = name.to_string();
            self.blocking(move |l| l.remove_document(&owned)).await?;
        }

        let id = Uuid::new_v4().to_string();
        let metadata =
            DocumentMetadata { id: id.clone(), pages: 0, status: DocumentStatus::Processing };
        entries.insert(name.to_string(), Entry::unloaded(metadata));
        self.persist(&entries).await?;
        Ok(id)
    }

    /// Store the index of a reserved document and flip it to `ready`.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if the reservation `id` no longer owns `name`
    ///   (for example because the document was deleted meanwhile).
    /// - [`RagError::DimensionMismatch`] if the index was built with another dimension.
    pub async fn commit(
        &self,
        name: &str,
        id: &str,
        pages: usize,
        index: DocumentIndex,
    ) -> Result<DocumentMetadata> {
        if index.dimensions() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: index.dimensions(),
            });
        }

        let mut entries = self.entries.write().await;
        let reserved = entries
            .get(name)
            .is_some_and(|e| e.metadata.id == id && e.metadata.status == DocumentStatus::Processing);
        if !reserved {
            return Err(RagError::NotFound(format!("reservation for '{name}'")));
        }

        let owned = name.to_string();
        let index = self.blocking(move |l| l.write_index(&owned, &index).map(|()| index)).await?;

        let Some(entry) = entries.get_mut(name) else {
            return Err(RagError::NotFound(format!("reservation for '{name}'")));
        };
        entry.metadata.pages = pages;
        entry.metadata.status = DocumentStatus::Ready;
        entry.index = Some(Arc::new(index));
        let metadata = entry.metadata.clone();

        self.persist(&entries).await?;
        info!(document.name = name, document.id = id, pages, "document ready");
        Ok(metadata)
    }

    /// Drop a reservation after a failed upload and remove its partial artifacts.
    ///
    /// Files are left alone if `name` has since been claimed by another upload.
    pub async fn abort(&self, name: &str, id: &str) -> Result<()> {
        check_document_name(name)?;
        let mut entries = self.entries.write().await;
        let owned = name.to_string();

        match entries.get(name) {
            Some(entry) if entry.metadata.id == id => {
                self.blocking(move |l| l.remove_document(&owned)).await?;
                entries.remove(name);
                self.persist(&entries).await
            }
            Some(_) => Ok(()),
            None => self.blocking(move |l| l.remove_document(&owned)).await,
        }
    }

    /// Register a fully built document in one step and return its id.
    pub async fn add(&self, name: &str, pages: usize, index: DocumentIndex) -> Result<String> {
        let id = self.reserve(name).await?;
        match self.commit(name, &id, pages, index).await {
            Ok(_) => Ok(id),
            Err(e) => {
                self.abort(name, &id).await?;
                Err(e)
            }
        }
    }

    /// Return the chunk metadata and embedding matrix of a ready document.
    ///
    /// The index is read from disk on first use and cached afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if the name is unknown, the document is
    /// not ready, or its artifacts are missing on disk.
    pub async fn get_chunks_and_embeddings(&self, name: &str) -> Result<Arc<DocumentIndex>> {
        {
            let entries = self.entries.read().await;
            let entry = ready_entry(&entries, name)?;
            if let Some(index) = &entry.index {
                if self.artifacts_present(name) {
                    return Ok(Arc::clone(index));
                }
            }
        }

        let mut entries = self.entries.write().await;
        ready_entry(&entries, name)?;

        let owned = name.to_string();
        let dimensions = self.dimensions;
        let loaded = self.blocking(move |l| l.read_index(&owned, dimensions)).await;

        let Some(entry) = entries.get_mut(name) else {
            return Err(RagError::NotFound(name.to_string()));
        };
        match loaded {
            Ok(index) => {
                let index = Arc::new(index);
                entry.index = Some(Arc::clone(&index));
                Ok(index)
            }
            Err(e) => {
                entry.index = None;
                Err(e)
            }
        }
    }

    /// Snapshot of the registry.
    pub async fn list(&self) -> BTreeMap<String, DocumentMetadata> {
        let entries = self.entries.read().await;
        entries.iter().map(|(name, entry)| (name.clone(), entry.metadata.clone())).collect()
    }

    /// Remove a document's metadata, chunks and embeddings together.
    ///
    /// Unknown names are a no-op. If the artifacts cannot all be removed the
    /// entry stays registered in status `error`, so a later delete can retry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `name` is not a usable document
    /// name; nothing on disk is touched in that case.
    pub async fn delete(&self, name: &str) -> Result<()> {
        check_document_name(name)?;
        let mut entries = self.entries.write().await;

        let owned = name.to_string();
        if let Err(e) = self.blocking(move |l| l.remove_document(&owned)).await {
            if let Some(entry) = entries.get_mut(name) {
                entry.metadata.status = DocumentStatus::Error;
                entry.index = None;
                self.persist(&entries).await?;
            }
            warn!(document.name = name, error = %e, "delete failed; document marked as error");
            return Err(e);
        }

        if let Some(entry) = entries.remove(name) {
            self.persist(&entries).await?;
            info!(document.name = name, document.id = %entry.metadata.id, "deleted document");
        }
        Ok(())
    }

    /// Names of the ready documents a query may search, in name order.
    ///
    /// An empty `ids` slice selects every ready document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoCandidates`] if nothing matches.
    pub async fn resolve_candidates(&self, ids: &[String]) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let names: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.metadata.status == DocumentStatus::Ready)
            .filter(|(_, entry)| ids.is_empty() || ids.contains(&entry.metadata.id))
            .map(|(name, _)| name.clone())
            .collect();

        if names.is_empty() {
            return Err(RagError::NoCandidates);
        }
        Ok(names)
    }

    fn artifacts_present(&self, name: &str) -> bool {
        self.layout.matrix_path(name).exists() && self.layout.chunks_path(name).exists()
    }

    async fn persist(&self, entries: &BTreeMap<String, Entry>) -> Result<()> {
        let registry: BTreeMap<String, DocumentMetadata> =
            entries.iter().map(|(name, entry)| (name.clone(), entry.metadata.clone())).collect();
        self.blocking(move |l| l.write_registry(&registry)).await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StorageLayout) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.layout, f).await
    }
}

/// Run storage I/O on the blocking pool.
async fn run_blocking<T, F>(layout: &StorageLayout, f: F) -> Result<T>
where
    F: FnOnce(&StorageLayout) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let owned = layout.clone();
    match tokio::task::spawn_blocking(move || f(&owned)).await {
        Ok(result) => result,
        Err(e) => Err(RagError::StorageError {
            path: layout.root().display().to_string(),
            message: format!("storage task failed: {e}"),
        }),
    }
}

fn ready_entry<'a>(entries: &'a BTreeMap<String, Entry>, name: &str) -> Result<&'a Entry> {
    match entries.get(name) {
        Some(entry) if entry.metadata.status == DocumentStatus::Ready => Ok(entry),
        Some(entry) => {
            Err(RagError::NotFound(format!("'{name}' is {}", entry.metadata.status)))
        }
        None => Err(RagError::NotFound(name.to_string())),
    }
}
