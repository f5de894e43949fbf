use serde::{Deserialize, Serialize};

/// A single piece of a [`crate::types::Content`] turn.
///
/// Only text parts are produced by this crate; other part kinds returned by
/// the service deserialize with `text == None` and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// The text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Set by the service when this part is model reasoning, not reply text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: None,
        }
    }

    /// True when the service marked this part as a thought.
    pub fn is_thought(&self) -> bool {
        self.thought.unwrap_or(false)
    }
}
