//! End-to-end tests for upload, list, query and delete through `RetrievalService`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pdfqa_rag::{
    DocumentStatus, DocumentStore, EmbeddingProvider, HashEmbeddingProvider, PageExtractor,
    RagConfig, RagError, Result, RetrievalQuery, RetrievalService, SearchOptions, StorageLayout,
    UploadFile,
};
use tokio_util::sync::CancellationToken;

const DIM: usize = 64;

/// Treats the upload bytes as UTF-8 text with form feeds between pages.
struct TextPages;

impl PageExtractor for TextPages {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| RagError::ExtractionError(e.to_string()))?;
        if text.starts_with("BROKEN") {
            return Err(RagError::ExtractionError("unreadable document".into()));
        }
        Ok(text.split('\x0c').map(str::to_string).collect())
    }
}

/// Never finishes an embedding call.
struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        std::future::pending().await
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Claims `DIM` dimensions but returns shorter vectors.
struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM / 2])
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn config() -> RagConfig {
    RagConfig::builder().dimensions(DIM).build().unwrap()
}

async fn service_with(dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> RetrievalService {
    let layout = StorageLayout::create(dir).unwrap();
    let store = DocumentStore::open(layout, DIM).await.unwrap();
    RetrievalService::builder()
        .config(config())
        .embedding_provider(provider)
        .extractor(Arc::new(TextPages))
        .store(Arc::new(store))
        .build()
        .unwrap()
}

async fn service(dir: &Path) -> RetrievalService {
    service_with(dir, Arc::new(HashEmbeddingProvider::new(DIM))).await
}

fn words(prefix: &str, n: usize) -> String {
    (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

fn pdf(name: &str, pages: &[String]) -> UploadFile {
    UploadFile::new(name, pages.join("\x0c"))
}

#[tokio::test]
async fn upload_chunks_pages_and_keeps_rows_aligned() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;

    let outcomes =
        service.upload(vec![pdf("manual.pdf", &[words("alpha", 250), words("beta", 50)])]).await;

    let doc = outcomes[0].result.as_ref().unwrap();
    assert_eq!(doc.filename, "manual.pdf");
    assert_eq!(doc.pages, 2);
    assert_eq!(doc.status, DocumentStatus::Ready);

    let index = service.store().get_chunks_and_embeddings("manual.pdf").await.unwrap();
    let shape: Vec<(usize, usize)> =
        index.chunks().iter().map(|c| (c.page, c.text.split(' ').count())).collect();
    assert_eq!(shape, vec![(1, 100), (1, 100), (1, 50), (2, 50)]);
    assert_eq!(index.rows().count(), index.len());
    assert!(temp.path().join("uploads").join("manual.pdf").exists());
}

#[tokio::test]
async fn query_returns_best_passage_first_and_composes_response() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;
    let beta = words("beta", 50);
    service.upload(vec![pdf("manual.pdf", &[words("alpha", 250), beta.clone()])]).await;

    let response = service.query(&RetrievalQuery::new(beta.clone())).await.unwrap();

    assert_eq!(response.sources.len(), 3);
    assert_eq!(response.sources[0].page, 2);
    assert_eq!(response.sources[0].text, beta);
    assert!((response.sources[0].score - 1.0).abs() < 1e-5);
    assert!(response.response.starts_with("Based on the PDF content:\n\n"));
    assert!(response.response.contains(&format!("From manual.pdf (Page 2): {beta}\n\n")));
}

#[tokio::test]
async fn invalid_files_fail_alone_in_a_batch() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;

    let outcomes = service
        .upload(vec![
            UploadFile::new("notes.txt", "plain text"),
            pdf("broken.pdf", &["BROKEN bytes".to_string()]),
            pdf("good.pdf", &[words("gamma", 10)]),
        ])
        .await;

    assert!(matches!(outcomes[0].result, Err(RagError::InvalidInput(_))));
    assert!(matches!(outcomes[1].result, Err(RagError::ProcessingFailure { .. })));
    assert!(outcomes[2].result.is_ok());

    let listed = service.list().await;
    assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["good.pdf"]);
    assert!(!temp.path().join("uploads").join("broken.pdf").exists());
    assert!(!temp.path().join("embeddings").join("broken.pdf.chunks.json").exists());
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;

    let first = service.upload(vec![pdf("a.pdf", &[words("one", 5)])]).await;
    let second = service.upload(vec![pdf("a.pdf", &[words("two", 5)])]).await;

    let id = first[0].result.as_ref().unwrap().id.clone();
    assert!(matches!(&second[0].result, Err(RagError::DuplicateName(name)) if name == "a.pdf"));
    assert_eq!(service.list().await["a.pdf"].id, id);
}

#[tokio::test]
async fn query_without_documents_has_no_candidates() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;

    let err = service.query(&RetrievalQuery::new("anything")).await.unwrap_err();
    assert!(matches!(err, RagError::NoCandidates));
}

#[tokio::test]
async fn deleted_documents_can_no_longer_be_queried() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;
    let outcomes = service.upload(vec![pdf("gone.pdf", &[words("delta", 20)])]).await;
    let id = outcomes[0].result.as_ref().unwrap().id.clone();

    service.delete("gone.pdf").await.unwrap();

    assert!(service.list().await.is_empty());
    assert!(!temp.path().join("uploads").join("gone.pdf").exists());
    let err =
        service.query(&RetrievalQuery::new("delta1").with_document_ids([id])).await.unwrap_err();
    assert!(matches!(err, RagError::NoCandidates));

    service.delete("never-uploaded.pdf").await.unwrap();
}

#[tokio::test]
async fn delete_refuses_names_outside_the_data_directory() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;
    service.upload(vec![pdf("kept.pdf", &[words("iota", 10)])]).await;

    let err = service.delete("../registry.json").await.unwrap_err();

    assert!(matches!(err, RagError::InvalidInput(_)));
    assert!(temp.path().join("registry.json").exists());
    assert_eq!(service.list().await.len(), 1);
}

#[tokio::test]
async fn queries_can_target_documents_and_override_limits() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;
    let outcomes = service
        .upload(vec![
            pdf("a.pdf", &[words("shared", 30), words("apple", 30)]),
            pdf("b.pdf", &[words("shared", 30), words("banana", 30)]),
        ])
        .await;
    let b_id = outcomes[1].result.as_ref().unwrap().id.clone();

    let only_b = RetrievalQuery::new("shared0 shared1").with_document_ids([b_id]);
    let response = service.query(&only_b).await.unwrap();
    assert!(!response.sources.is_empty());
    assert!(response.sources.iter().all(|s| s.document_name == "b.pdf"));

    let narrow = RetrievalQuery::new("shared0 shared1")
        .with_options(SearchOptions { top_k_per_doc: 1, top_k_overall: 1 });
    let response = service.query(&narrow).await.unwrap();
    assert_eq!(response.sources.len(), 1);
}

#[tokio::test]
async fn documents_without_text_are_ready_but_yield_no_passages() {
    let temp = tempfile::tempdir().unwrap();
    let service = service(temp.path()).await;

    let outcomes = service.upload(vec![pdf("scan.pdf", &[String::new(), "  ".to_string()])]).await;
    let doc = outcomes[0].result.as_ref().unwrap();
    assert_eq!((doc.pages, doc.status), (2, DocumentStatus::Ready));

    let response = service.query(&RetrievalQuery::new("anything")).await.unwrap();
    assert!(response.sources.is_empty());
    assert_eq!(response.response, "Based on the PDF content:\n\n");
}

#[tokio::test]
async fn uploads_survive_a_restart() {
    let temp = tempfile::tempdir().unwrap();
    {
        let service = service(temp.path()).await;
        service.upload(vec![pdf("kept.pdf", &[words("epsilon", 40)])]).await;
    }

    let reopened = service(temp.path()).await;
    let listed = reopened.list().await;
    assert_eq!(listed["kept.pdf"].status, DocumentStatus::Ready);

    let response = reopened.query(&RetrievalQuery::new("epsilon3")).await.unwrap();
    assert_eq!(response.sources[0].document_name, "kept.pdf");
}

#[tokio::test]
async fn wrong_width_embeddings_fail_the_upload() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_with(temp.path(), Arc::new(ShortEmbedder)).await;

    let outcomes = service.upload(vec![pdf("a.pdf", &[words("zeta", 10)])]).await;

    assert!(matches!(outcomes[0].result, Err(RagError::ProcessingFailure { .. })));
    assert!(service.list().await.is_empty());
}

#[tokio::test]
async fn mismatched_provider_is_rejected_at_build() {
    let temp = tempfile::tempdir().unwrap();
    let layout = StorageLayout::create(temp.path()).unwrap();
    let store = DocumentStore::open(layout, DIM).await.unwrap();

    let result = RetrievalService::builder()
        .config(config())
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(DIM * 2)))
        .store(Arc::new(store))
        .build();

    assert!(matches!(result, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn cancelled_uploads_leave_nothing_behind() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_with(temp.path(), Arc::new(StalledEmbedder)).await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcomes = service
        .upload_with_cancellation(
            vec![pdf("slow.pdf", &[words("eta", 10)]), pdf("later.pdf", &[words("theta", 10)])],
            &cancel,
        )
        .await;

    assert!(outcomes.iter().all(|o| matches!(o.result, Err(RagError::Cancelled))));
    assert!(service.list().await.is_empty());
    assert!(!temp.path().join("uploads").join("slow.pdf").exists());
}
