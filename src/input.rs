//! Input handling: accepted document forms and file-signature validation.
//!
//! Signature checks run before any extraction. A mismatch between the
//! declared extension and the detected magic bytes is a validation error,
//! not something the cascade is allowed to paper over.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Document formats recognized by signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `%PDF`
    Pdf,
    /// `\x89PNG\r\n\x1a\n`
    Png,
    /// `\xff\xd8\xff`
    Jpeg,
    /// `II*\0` or `MM\0*`
    Tiff,
    /// `BM`
    Bmp,
    /// `GIF87a` / `GIF89a`
    Gif,
    /// `RIFF....WEBP`
    Webp,
}

impl FileKind {
    /// Canonical lowercase extension for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Png => "png",
            FileKind::Jpeg => "jpg",
            FileKind::Tiff => "tiff",
            FileKind::Bmp => "bmp",
            FileKind::Gif => "gif",
            FileKind::Webp => "webp",
        }
    }

    /// Whether a declared extension is acceptable for this kind.
    fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            FileKind::Jpeg => matches!(ext.as_str(), "jpg" | "jpeg"),
            FileKind::Tiff => matches!(ext.as_str(), "tif" | "tiff"),
            other => ext == other.extension(),
        }
    }
}

/// Detect a file kind from its leading bytes.
///
/// Returns `None` when no known signature matches.
pub fn detect_signature(bytes: &[u8]) -> Option<FileKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(FileKind::Pdf);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(FileKind::Png);
    }
    if bytes.starts_with(b"\xff\xd8\xff") {
        return Some(FileKind::Jpeg);
    }
    if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
        return Some(FileKind::Tiff);
    }
    if bytes.starts_with(b"BM") {
        return Some(FileKind::Bmp);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(FileKind::Gif);
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(FileKind::Webp);
    }
    None
}

/// One of the accepted input forms.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    /// Filesystem path to a document.
    Path(PathBuf),
    /// Whole document as a byte buffer, with the declared extension.
    Bytes {
        /// Document content
        data: Vec<u8>,
        /// Extension declared by the caller (e.g. `"pdf"`)
        extension: String,
    },
    /// Pre-rendered page images (one buffer per page).
    PageImages(Vec<Vec<u8>>),
}

impl DocumentInput {
    /// Build an input from a path.
    pub fn path<P: AsRef<Path>>(p: P) -> Self {
        DocumentInput::Path(p.as_ref().to_path_buf())
    }

    /// Validate the input's signature against its declared extension.
    ///
    /// For [`DocumentInput::PageImages`] every page buffer must carry an
    /// image signature (any kind except PDF).
    pub fn validate(&self) -> Result<FileKind> {
        match self {
            DocumentInput::Path(path) => {
                let data = std::fs::read(path)?;
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string();
                validate_bytes(&data, &ext)
            }
            DocumentInput::Bytes { data, extension } => validate_bytes(data, extension),
            DocumentInput::PageImages(pages) => {
                if pages.is_empty() {
                    return Err(Error::InvalidInput("empty page-image list".into()));
                }
                let mut first = None;
                for (i, page) in pages.iter().enumerate() {
                    match detect_signature(page) {
                        Some(FileKind::Pdf) | None => {
                            return Err(Error::InvalidInput(format!(
                                "page image {} has no recognized image signature",
                                i + 1
                            )));
                        }
                        Some(kind) => {
                            first.get_or_insert(kind);
                        }
                    }
                }
                Ok(first.expect("non-empty page list"))
            }
        }
    }
}

fn validate_bytes(data: &[u8], declared_ext: &str) -> Result<FileKind> {
    let kind = detect_signature(data).ok_or_else(|| {
        Error::InvalidInput("unrecognized file signature (not PDF or a supported image)".into())
    })?;
    if !declared_ext.is_empty() && !kind.matches_extension(declared_ext) {
        return Err(Error::SignatureMismatch {
            declared: declared_ext.to_ascii_lowercase(),
            detected: kind.extension().to_string(),
        });
    }
    Ok(kind)
}
