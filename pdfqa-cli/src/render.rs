//! Plain-text output for the CLI commands.

use std::collections::BTreeMap;

use pdfqa_rag::{DocumentMetadata, RetrievalResponse, UploadOutcome};

pub fn upload_outcomes(outcomes: &[UploadOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(doc) => println!(
                "{}  id={}  pages={}  status={}",
                doc.filename, doc.id, doc.pages, doc.status
            ),
            Err(e) => println!("{}  failed: {e}", outcome.filename),
        }
    }
}

pub fn documents(documents: &BTreeMap<String, DocumentMetadata>) {
    if documents.is_empty() {
        println!("No documents uploaded.");
        return;
    }
    for (name, meta) in documents {
        println!("{name}  id={}  pages={}  status={}", meta.id, meta.pages, meta.status);
    }
}

pub fn response(response: &RetrievalResponse) {
    print!("{}", response.response);
    if response.sources.is_empty() {
        return;
    }
    println!("Sources:");
    for (rank, source) in response.sources.iter().enumerate() {
        println!(
            "  {}. {} page {}  score={:.4}",
            rank + 1,
            source.document_name,
            source.page,
            source.score
        );
    }
}
