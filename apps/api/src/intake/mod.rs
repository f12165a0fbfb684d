//! File intake: turns one uploaded file into resume text.
//!
//! The extension picks a real decoder. Formats without one (`.doc`, `.rtf`,
//! anything unknown) are rejected instead of being read as raw bytes.

pub mod multipart;
mod office;
mod text;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("File is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("File contains no readable text")]
    Empty,

    #[error("Text decoding failed: {0}")]
    Encoding(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Document archive unreadable: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Formats with a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
    Odt,
}

impl DocumentFormat {
    /// Picks a decoder from the file name's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, ReadError> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" | "text" | "md" => Ok(DocumentFormat::PlainText),
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "odt" => Ok(DocumentFormat::Odt),
            _ => Err(ReadError::UnsupportedFormat(ext)),
        }
    }
}

/// A single file received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub format: DocumentFormat,
}

/// Decodes one upload. Extraction runs on the blocking pool; a panic inside
/// a decoder surfaces as a `ReadError` rather than taking the task down.
pub async fn read_upload(upload: Upload, max_bytes: usize) -> Result<DecodedText, ReadError> {
    let size = upload.bytes.len();
    if size > max_bytes {
        return Err(ReadError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let format = DocumentFormat::from_filename(&upload.filename)?;
    let bytes = upload.bytes;

    let decoded = tokio::task::spawn_blocking(move || decode(format, &bytes))
        .await
        .map_err(|e| {
            warn!("Decoder task failed: {e}");
            match format {
                DocumentFormat::Pdf => ReadError::Pdf("extractor aborted".to_string()),
                _ => ReadError::Archive("decoder aborted".to_string()),
            }
        })??;

    let text = decoded.trim().to_string();
    if text.is_empty() {
        return Err(ReadError::Empty);
    }

    debug!(
        "Decoded '{}' as {:?}: {} bytes -> {} chars",
        upload.filename,
        format,
        size,
        text.chars().count()
    );

    Ok(DecodedText { text, format })
}

fn decode(format: DocumentFormat, bytes: &[u8]) -> Result<String, ReadError> {
    match format {
        DocumentFormat::PlainText => text::decode_plain_text(bytes),
        DocumentFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ReadError::Pdf(format!("{e:?}")))
        }
        DocumentFormat::Docx => office::extract_docx(bytes),
        DocumentFormat::Odt => office::extract_odt(bytes),
    }
}
