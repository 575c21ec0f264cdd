//! Response text assembly from ranked passages.
//!
//! Composition is a template fill: passages are quoted verbatim in rank
//! order. Generating an answer from the passages is left to an external
//! collaborator implementing [`AnswerComposer`].

use std::fmt::Write;

use crate::document::RetrievedPassage;

/// Turns ranked passages into a human-readable response string.
pub trait AnswerComposer: Send + Sync {
    fn compose(&self, passages: &[RetrievedPassage]) -> String;
}

/// The default preamble placed before the quoted passages.
pub const DEFAULT_PREAMBLE: &str = "Based on the PDF content:";

/// Fixed-template [`AnswerComposer`].
///
/// Produces the preamble followed by one block per passage:
///
/// ```text
/// Based on the PDF content:
///
/// From manual.pdf (Page 3): chunk text...
///
/// ```
#[derive(Debug, Clone)]
pub struct TemplateComposer {
    preamble: String,
}

impl TemplateComposer {
    pub fn new() -> Self {
        Self { preamble: DEFAULT_PREAMBLE.to_string() }
    }

    /// Replace the preamble line.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }
}

impl Default for TemplateComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerComposer for TemplateComposer {
    fn compose(&self, passages: &[RetrievedPassage]) -> String {
        let mut out = format!("{}\n\n", self.preamble);
        for passage in passages {
            // Writing into a String cannot fail.
            let _ = write!(
                out,
                "From {} (Page {}): {}\n\n",
                passage.document_name, passage.page, passage.text
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(doc: &str, page: usize, text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage { text: text.into(), page, document_name: doc.into(), score }
    }

    #[test]
    fn quotes_passages_in_given_order() {
        let passages =
            vec![passage("b.pdf", 2, "second doc text", 0.9), passage("a.pdf", 1, "first", 0.4)];

        let text = TemplateComposer::new().compose(&passages);

        assert_eq!(
            text,
            "Based on the PDF content:\n\n\
             From b.pdf (Page 2): second doc text\n\n\
             From a.pdf (Page 1): first\n\n"
        );
    }

    #[test]
    fn empty_results_yield_only_the_preamble() {
        let text = TemplateComposer::new().with_preamble("Sources:").compose(&[]);
        assert_eq!(text, "Sources:\n\n");
    }
}
