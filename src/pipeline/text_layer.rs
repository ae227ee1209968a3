//! Native text layer extraction via `pdf-extract`.
//!
//! Digitally generated data sheets carry their text as PDF content streams;
//! reading it costs milliseconds and is exact. The extractor is a trait so the
//! pipeline can be driven with canned pages in tests.
//!
//! `pdf-extract` panics on some malformed fonts and content streams instead of
//! returning an error, so every call is wrapped in `catch_unwind` and a panic
//! becomes an ordinary [`ExtractionError::TextLayer`].

use crate::error::ExtractionError;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Text of one page, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_num: usize,
    pub text: String,
}

/// Reads the embedded text layer of a PDF, one entry per page.
pub trait TextLayerExtractor: Send + Sync {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError>;
}

/// [`TextLayerExtractor`] backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextLayerExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }));

        let page_texts = match result {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => return Err(ExtractionError::TextLayer(e.to_string())),
            Err(payload) => {
                return Err(ExtractionError::TextLayer(format!(
                    "parser panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }
        };

        debug!("Text layer: {} pages", page_texts.len());
        Ok(page_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page_num: i + 1,
                text,
            })
            .collect())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
