use serde::{Deserialize, Serialize};

use crate::types::Part;

/// The author of a [`Content`] turn on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    /// Text written by the end user.
    User,

    /// Text produced by the model.
    Model,
}

/// One turn of a conversation as the remote service sees it.
///
/// System instructions are also carried as a `Content`, but without a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Who produced this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ContentRole>,

    /// The ordered parts making up this turn.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn holding a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some(ContentRole::User),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a model turn holding a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some(ContentRole::Model),
            parts: vec![Part::text(text)],
        }
    }

    /// Create a role-less content used for system instructions.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenate every visible text part, skipping model thoughts.
    ///
    /// Returns `None` when no part carries text.
    pub fn text(&self) -> Option<String> {
        let mut out: Option<String> = None;
        for part in self.parts.iter().filter(|p| !p.is_thought()) {
            if let Some(text) = &part.text {
                out.get_or_insert_with(String::new).push_str(text);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn user_content_serialization() {
        let content = Content::user("What's on the menu?");
        assert_eq!(
            to_value(&content).unwrap(),
            json!({
                "role": "user",
                "parts": [{"text": "What's on the menu?"}]
            })
        );
    }

    #[test]
    fn system_content_has_no_role() {
        let content = Content::system("Be brief.");
        assert_eq!(
            to_value(&content).unwrap(),
            json!({"parts": [{"text": "Be brief."}]})
        );
    }

    #[test]
    fn text_skips_thoughts() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [
                {"text": "planning...", "thought": true},
                {"text": "The turkey"},
                {"text": " is £25."}
            ]
        }))
        .unwrap();
        assert_eq!(content.text().as_deref(), Some("The turkey is £25."));
    }

    #[test]
    fn text_is_none_without_text_parts() {
        let content: Content = serde_json::from_value(json!({"role": "model"})).unwrap();
        assert_eq!(content.text(), None);
    }
}
