use serde::{Deserialize, Serialize};

/// An ingested document, ready to become a knowledge source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    /// File name as supplied by the user.
    pub name: String,
    /// Decoded text.
    pub content: String,
    /// Size of the original file in bytes.
    pub size: u64,
}
