use serde::{Deserialize, Serialize};

use crate::types::{Content, FinishReason};

/// One candidate reply inside a [`GenerateContentResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content; absent on some terminal or blocked chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    /// Set on the final chunk of a candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Candidate index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Token accounting reported by the service.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt, including the system instruction.
    #[serde(default)]
    pub prompt_token_count: Option<u32>,

    /// Tokens across generated candidates.
    #[serde(default)]
    pub candidates_token_count: Option<u32>,

    /// Prompt plus candidates.
    #[serde(default)]
    pub total_token_count: Option<u32>,
}

/// A complete response, or one chunk of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate replies; the pipeline only ever reads the first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Token usage, usually only on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    /// Exact model version that served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// Create a chunk whose first candidate carries `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content::model(text)),
                finish_reason: None,
                index: Some(0),
            }],
            usage_metadata: None,
            model_version: None,
        }
    }

    /// The visible text of the first candidate, if any.
    ///
    /// A chunk may legitimately carry no text (usage-only or finish-only
    /// chunks); callers treat `None` and `Some("")` as "no fragment this tick".
    pub fn text(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(Content::text)
    }

    /// The finish reason of the first candidate, if reported.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.candidates.first().and_then(|c| c.finish_reason)
    }
}
