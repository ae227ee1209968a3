//! Input resolution: turn a path, URL or byte buffer into a [`Document`].
//!
//! Everything downstream works on the in-memory bytes: `pdf-extract` and
//! pdfium both load from a slice, so no temporary copy of the PDF is written.
//! The `%PDF` header is checked here so callers get a meaningful error
//! rather than a parser failure three stages later.

use crate::error::AuditError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// PDF readers accept a header anywhere in the first KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// An immutable PDF byte sequence with a label describing where it came from.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone)]
pub struct Document {
    bytes: Arc<[u8]>,
    source: String,
}

impl Document {
    /// Wrap raw bytes, validating the PDF header.
    pub fn from_bytes(
        bytes: impl Into<Arc<[u8]>>,
        source: impl Into<String>,
    ) -> Result<Self, AuditError> {
        let bytes = bytes.into();
        let source = source.into();
        if !has_pdf_header(&bytes) {
            return Err(AuditError::NotAPdf {
                source_name: source,
                magic: bytes.iter().take(8).copied().collect(),
            });
        }
        Ok(Self { bytes, source })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle on the bytes, for moving into blocking workers.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.source)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP/HTTPS URL into a [`Document`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, AuditError> {
    if input.trim().is_empty() {
        return Err(AuditError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Document, AuditError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => AuditError::PermissionDenied { path: path.clone() },
        _ => AuditError::FileNotFound { path: path.clone() },
    })?;
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(bytes, path.display().to_string())
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, AuditError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AuditError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let timeout_or_failed = |e: reqwest::Error| {
        if e.is_timeout() {
            AuditError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AuditError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(timeout_or_failed)?;

    if !response.status().is_success() {
        return Err(AuditError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(timeout_or_failed)?;
    info!("Downloaded {} bytes", bytes.len());

    Document::from_bytes(bytes.to_vec(), source_name(url))
}

/// Last path segment of a URL, or the URL itself.
fn source_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| url.to_string())
}
