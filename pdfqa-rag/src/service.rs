//! Retrieval service orchestrator.
//!
//! [`RetrievalService`] wires the extractor, [`Chunker`], [`EmbeddingProvider`],
//! [`DocumentStore`], [`SimilaritySearch`] and [`AnswerComposer`] together
//! and exposes the four user-facing operations: upload, list, query and delete.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{HashEmbeddingProvider, RagConfig, RetrievalQuery, RetrievalService, UploadFile};
//!
//! let service = RetrievalService::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(384)))
//!     .store(Arc::new(store))
//!     .build()?;
//!
//! let outcomes = service.upload(vec![UploadFile::new("manual.pdf", bytes)]).await;
//! let answer = service.query(&RetrievalQuery::new("how do I reset it?")).await?;
//! println!("{}", answer.response);
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, WordWindowChunker};
use crate::compose::{AnswerComposer, TemplateComposer};
use crate::config::RagConfig;
use crate::document::{
    Chunk, DocumentMetadata, ExtractedDocument, RetrievalQuery, RetrievalResponse, UploadFile,
    UploadOutcome, UploadedDocument,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{PageExtractor, PdfPageExtractor};
use crate::index::DocumentIndex;
use crate::search::SimilaritySearch;
use crate::storage::{StorageLayout, check_document_name};
use crate::store::DocumentStore;

/// Number of chunk texts sent to the embedding provider per call.
const EMBED_BATCH_SIZE: usize = 64;

/// Upload, list, query and delete over a file-backed document store.
///
/// Construct one via [`RetrievalService::builder()`] or [`RetrievalService::open`].
pub struct RetrievalService {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn PageExtractor>,
    chunker: Arc<dyn Chunker>,
    composer: Arc<dyn AnswerComposer>,
    store: Arc<DocumentStore>,
    search: SimilaritySearch,
}

impl RetrievalService {
    /// Create a new [`RetrievalServiceBuilder`].
    pub fn builder() -> RetrievalServiceBuilder {
        RetrievalServiceBuilder::default()
    }

    /// Open (or create) a store under `data_dir` and build a service with
    /// default extractor, chunker and composer.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let layout = StorageLayout::create(data_dir.as_ref())?;
        let store = DocumentStore::open(layout, config.dimensions).await?;
        Self::builder()
            .config(config)
            .embedding_provider(embedding_provider)
            .store(Arc::new(store))
            .build()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Ingest a batch of files: validate → extract → chunk → embed → store.
    ///
    /// Each file succeeds or fails on its own; one outcome is returned per
    /// file, in input order.
    pub async fn upload(&self, files: Vec<UploadFile>) -> Vec<UploadOutcome> {
        self.upload_with_cancellation(files, &CancellationToken::new()).await
    }

    /// Like [`upload`](Self::upload), but stops embedding work once `cancel` fires.
    ///
    /// The file being processed and every file not yet started fail with
    /// [`RagError::Cancelled`]; their partial artifacts are removed.
    pub async fn upload_with_cancellation(
        &self,
        files: Vec<UploadFile>,
        cancel: &CancellationToken,
    ) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let filename = file.filename.clone();
            let result = if cancel.is_cancelled() {
                Err(RagError::Cancelled)
            } else {
                self.upload_one(file, cancel).await
            };
            if let Err(e) = &result {
                warn!(document.name = %filename, error = %e, "upload rejected");
            }
            outcomes.push(UploadOutcome { filename, result });
        }
        outcomes
    }

    async fn upload_one(
        &self,
        file: UploadFile,
        cancel: &CancellationToken,
    ) -> Result<UploadedDocument> {
        check_document_name(&file.filename)?;
        let name = file.filename.clone();
        let id = self.store.reserve(&name).await?;

        match self.ingest_reserved(file, &id, cancel).await {
            Ok(metadata) => Ok(UploadedDocument {
                filename: name,
                id: metadata.id,
                pages: metadata.pages,
                status: metadata.status,
            }),
            Err(e) => {
                error!(document.name = %name, error = %e, "ingestion failed; removing partial artifacts");
                if let Err(cleanup) = self.store.abort(&name, &id).await {
                    error!(document.name = %name, error = %cleanup, "cleanup after failed ingestion failed");
                }
                Err(e)
            }
        }
    }

    async fn ingest_reserved(
        &self,
        file: UploadFile,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<DocumentMetadata> {
        let UploadFile { filename: name, bytes } = file;
        let failed = |e: RagError| processing_failure(&name, e);

        self.store.layout().write_upload(&name, &bytes).map_err(failed)?;

        let extractor = Arc::clone(&self.extractor);
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
            .await
            .map_err(|e| failed(RagError::ExtractionError(format!("extraction task failed: {e}"))))?
            .map_err(failed)?;
        let page_count = pages.len();

        let document = ExtractedDocument { name: name.clone(), pages };
        let chunks = self.chunker.chunk(&document);
        debug!(document.name = %name, pages = page_count, chunk_count = chunks.len(), "chunked document");

        let embeddings = self.embed_chunks(&chunks, cancel).await.map_err(failed)?;
        let index =
            DocumentIndex::new(self.config.dimensions, chunks, embeddings).map_err(failed)?;
        let chunk_count = index.len();

        let metadata = self.store.commit(&name, id, page_count, index).await.map_err(failed)?;
        info!(document.name = %name, document.id = id, pages = page_count, chunk_count, "ingested document");
        Ok(metadata)
    }

    async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let vectors = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RagError::Cancelled),
                result = self.embedding_provider.embed_batch(batch) => result?,
            };
            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.embedding_provider.name().to_string(),
                    message: format!("expected {} vectors, received {}", batch.len(), vectors.len()),
                });
            }
            embeddings.extend(vectors);
            debug!(embedded = embeddings.len(), total = texts.len(), "embedded chunk batch");
        }

        Ok(embeddings)
    }

    /// The full name → metadata registry.
    pub async fn list(&self) -> BTreeMap<String, DocumentMetadata> {
        self.store.list().await
    }

    /// Retrieve the passages most similar to the query and compose a response.
    ///
    /// The response text is a template fill over the ranked sources; nothing
    /// is generated.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoCandidates`] if no ready document matches the requested ids.
    /// - [`RagError::DimensionMismatch`] if the provider returns a vector of the wrong size.
    pub async fn query(&self, query: &RetrievalQuery) -> Result<RetrievalResponse> {
        let candidates = self.store.resolve_candidates(&query.document_ids).await?;

        let vector = self.embedding_provider.embed(&query.text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;
        if vector.len() != self.config.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: vector.len(),
            });
        }

        let options = query.options.unwrap_or_else(|| self.search.options());
        let sources = self.search.search_with(&self.store, &vector, &candidates, options).await?;
        let response = self.composer.compose(&sources);

        info!(candidates = candidates.len(), result_count = sources.len(), "query completed");
        Ok(RetrievalResponse { response, sources })
    }

    /// Delete a document and all of its artifacts. Unknown names are a no-op.
    ///
    /// Names that are not valid document names fail with [`RagError::InvalidInput`].
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store.delete(name).await
    }
}

fn processing_failure(document: &str, e: RagError) -> RagError {
    match e {
        RagError::Cancelled => RagError::Cancelled,
        other => RagError::ProcessingFailure {
            document: document.to_string(),
            message: other.to_string(),
        },
    }
}

/// Builder for constructing a [`RetrievalService`].
///
/// `embedding_provider` and `store` are required. The extractor, chunker and
/// composer default to [`PdfPageExtractor`], a [`WordWindowChunker`] sized
/// from the config, and [`TemplateComposer`].
#[derive(Default)]
pub struct RetrievalServiceBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    extractor: Option<Arc<dyn PageExtractor>>,
    chunker: Option<Arc<dyn Chunker>>,
    composer: Option<Arc<dyn AnswerComposer>>,
    store: Option<Arc<DocumentStore>>,
}

impl RetrievalServiceBuilder {
    /// Set the configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn composer(mut self, composer: Arc<dyn AnswerComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the [`RetrievalService`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or if
    /// the provider, store and config disagree on the embedding dimension.
    pub fn build(self) -> Result<RetrievalService> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| RagError::ConfigError("store is required".to_string()))?;

        if embedding_provider.dimensions() != config.dimensions {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' produces {} dimensions but the config expects {}",
                embedding_provider.name(),
                embedding_provider.dimensions(),
                config.dimensions
            )));
        }
        if store.dimensions() != config.dimensions {
            return Err(RagError::ConfigError(format!(
                "store holds {}-dimension matrices but the config expects {}",
                store.dimensions(),
                config.dimensions
            )));
        }

        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(WordWindowChunker::new(config.chunk_size)));
        let extractor = self.extractor.unwrap_or_else(|| Arc::new(PdfPageExtractor::new()));
        let composer = self.composer.unwrap_or_else(|| Arc::new(TemplateComposer::new()));
        let search = SimilaritySearch::new(config.search_options());

        Ok(RetrievalService {
            config,
            embedding_provider,
            extractor,
            chunker,
            composer,
            store,
            search,
        })
    }
}
