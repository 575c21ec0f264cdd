mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use pdfqa_rag::{
    EmbeddingProvider, HashEmbeddingProvider, RagConfig, RetrievalQuery, RetrievalService,
    UploadFile,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdfqa", about = "Upload PDFs and retrieve passages relevant to a question", version)]
struct Cli {
    /// Directory holding uploads, embeddings and the document registry
    #[arg(long, global = true, env = "PDFQA_DATA_DIR", default_value = "./pdfqa-data")]
    data_dir: PathBuf,

    /// Words per chunk
    #[arg(long, global = true, env = "PDFQA_CHUNK_SIZE", default_value_t = 100)]
    chunk_size: usize,

    /// Passages kept per document before merging
    #[arg(long, global = true, env = "PDFQA_TOP_K_PER_DOC", default_value_t = 3)]
    top_k_per_doc: usize,

    /// Passages returned overall
    #[arg(long, global = true, env = "PDFQA_TOP_K", default_value_t = 5)]
    top_k: usize,

    /// Embedding backend
    #[arg(long, global = true, env = "PDFQA_EMBEDDER", default_value = "hash")]
    embedder: EmbedderKind,

    /// API key for the openai embedder
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Deterministic feature hashing, no network
    Hash,
    /// OpenAI embeddings API (requires the `openai` feature)
    Openai,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one or more PDF files
    Upload {
        /// Paths of the PDF files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List uploaded documents
    List,

    /// Retrieve passages relevant to a question
    Query {
        /// Question text
        text: String,
        /// Restrict the search to these document ids (repeatable)
        #[arg(long = "doc-id")]
        doc_ids: Vec<String>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a document and its stored data
    Delete {
        /// Document name, e.g. manual.pdf
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = RagConfig::builder()
        .chunk_size(cli.chunk_size)
        .top_k_per_doc(cli.top_k_per_doc)
        .top_k_overall(cli.top_k)
        .build()?;
    let provider = embedding_provider(cli.embedder, cli.openai_api_key.as_deref(), &config)?;
    let service = RetrievalService::open(&cli.data_dir, config, provider)
        .await
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;

    match cli.command {
        Command::Upload { files } => upload(&service, &files).await,
        Command::List => {
            render::documents(&service.list().await);
            Ok(())
        }
        Command::Query { text, doc_ids, json } => {
            let query = RetrievalQuery::new(text).with_document_ids(doc_ids);
            let response = service.query(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                render::response(&response);
            }
            Ok(())
        }
        Command::Delete { name } => {
            service.delete(&name).await?;
            println!("Document {name} deleted successfully");
            Ok(())
        }
    }
}

async fn upload(service: &RetrievalService, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(UploadFile::new(file_name(path)?, bytes));
    }

    let outcomes = service.upload(files).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    render::upload_outcomes(&outcomes);
    info!(total = outcomes.len(), failed, "upload finished");

    if failed > 0 {
        bail!("{failed} of {} uploads failed", outcomes.len());
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn embedding_provider(
    kind: EmbedderKind,
    api_key: Option<&str>,
    config: &RagConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match kind {
        EmbedderKind::Hash => Ok(Arc::new(HashEmbeddingProvider::new(config.dimensions))),
        EmbedderKind::Openai => openai_provider(api_key, config),
    }
}

#[cfg(feature = "openai")]
fn openai_provider(api_key: Option<&str>, config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    use pdfqa_rag::openai::OpenAIEmbeddingProvider;

    let Some(key) = api_key else {
        bail!("OPENAI_API_KEY must be set to use the openai embedder");
    };
    let provider = OpenAIEmbeddingProvider::new(key)?.with_dimensions(config.dimensions);
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_provider(_api_key: Option<&str>, _config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    bail!("pdfqa was built without the `openai` feature")
}
