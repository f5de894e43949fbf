//! Document ingestion.
//!
//! Turns a user-supplied file into [`FileData`] that can ground a session.
//! Only plain text is accepted; everything else is refused with a message that
//! can be shown to the user as-is.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::FileData;

/// Largest document accepted, in bytes.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Shown when a file's type is not accepted.
pub const REJECTION_MESSAGE: &str = "Please upload a plain text file (.txt or .md)";

/// Which files are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptPolicy {
    /// `text/*` by declared type, or `.txt` / `.md` by extension.
    #[default]
    Strict,
    /// [`AcceptPolicy::Strict`] plus `.json` and `.csv` by extension.
    Uploader,
}

impl AcceptPolicy {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            AcceptPolicy::Strict => &["txt", "md"],
            AcceptPolicy::Uploader => &["txt", "md", "json", "csv"],
        }
    }

    /// True if a file with this name and declared media type may be ingested.
    pub fn accepts(self, name: &str, declared_type: Option<&str>) -> bool {
        if declared_type.is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("text/")) {
            return true;
        }
        extension(name).is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Media type implied by a file name, as a browser would declare it.
pub fn guess_media_type(name: &str) -> Option<&'static str> {
    match extension(name)?.as_str() {
        "txt" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        "html" | "htm" => Some("text/html"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Check a file's name, declared type and size before reading it.
pub fn check(name: &str, declared_type: Option<&str>, size: u64, policy: AcceptPolicy) -> Result<()> {
    if !policy.accepts(name, declared_type) {
        tracing::info!(name, ?declared_type, "file rejected by type");
        return Err(Error::unsupported_file(REJECTION_MESSAGE, name));
    }
    if size > MAX_FILE_SIZE {
        tracing::info!(name, size, "file rejected by size");
        return Err(Error::unsupported_file(
            "File is too large. Please upload a file under 1 MiB.",
            name,
        ));
    }
    Ok(())
}

/// Ingest a document already held in memory.
pub fn ingest_bytes(
    name: &str,
    declared_type: Option<&str>,
    bytes: Vec<u8>,
    policy: AcceptPolicy,
) -> Result<FileData> {
    let size = bytes.len() as u64;
    check(name, declared_type, size, policy)?;
    let content = String::from_utf8(bytes)?;
    Ok(FileData {
        name: name.to_string(),
        content,
        size,
    })
}

/// Ingest a document from disk.
///
/// The declared type is inferred from the extension.  Type and size are
/// checked before the file is read.
pub async fn ingest_path(path: impl AsRef<Path>, policy: AcceptPolicy) -> Result<FileData> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io(format!("failed to stat {}", path.display()), e))?;
    check(&name, guess_media_type(&name), metadata.len(), policy)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
    let file = ingest_bytes(&name, guess_media_type(&name), bytes, policy)?;
    tracing::info!(name = %file.name, size = file.size, "document ingested");
    Ok(file)
}
