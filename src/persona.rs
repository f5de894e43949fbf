//! Assistant personas.
//!
//! A persona is everything about the assistant that is fixed for a session:
//! the system-instruction template, the canned deflection for off-topic
//! questions, the greeting, and the sampling temperature.  The restaurant
//! concierge and the generic document assistant differ only in these values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::knowledge::KnowledgeSource;
use crate::types::Model;

/// Placeholder in a rule that is replaced by [`Persona::deflection`].
pub const DEFLECTION_PLACEHOLDER: &str = "{deflection}";

/// Configurable assistant persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name used by renderers.
    pub name: String,

    /// First assistant message shown when a conversation starts.
    pub greeting: String,

    /// Opening paragraph of the system instruction.
    pub preamble: String,

    /// Numbered behavioral rules appended after the grounding text.
    pub rules: Vec<String>,

    /// Sentence the model must use, verbatim, for unrelated questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deflection: Option<String>,

    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,

    /// Model serving this persona.
    #[serde(default)]
    pub model: Model,
}

impl Persona {
    /// The restaurant concierge: strictly grounded, low temperature.
    pub fn restaurant() -> Self {
        Self {
            name: "1947 London".to_string(),
            greeting: "Hello! I can help you with the 1947 London Christmas menu. What would you like to know?".to_string(),
            preamble: "You are the concierge of 1947 London, a restaurant. You answer guests' \
                       questions about the restaurant using only the reference material below."
                .to_string(),
            rules: vec![
                "Answer only from the reference material. Quote dishes, prices and times exactly as written.".to_string(),
                format!(
                    "If a question is unrelated to the restaurant, or its answer is not in the reference material, reply with exactly this sentence and nothing else: \"{DEFLECTION_PLACEHOLDER}\""
                ),
                "Never mention \"the document\", \"the reference material\" or any file to the guest. Speak as a member of staff who simply knows the menu.".to_string(),
                "When a dish carries allergy codes such as (G), (D), (N) or (VG), repeat those codes literally and explain them when asked.".to_string(),
                "Keep replies short, warm and factual. Never invent dishes, prices or availability.".to_string(),
            ],
            deflection: Some(
                "I'm sorry, I can only help with questions about 1947 London and our Christmas menu."
                    .to_string(),
            ),
            temperature: 0.2,
            model: Model::default(),
        }
    }

    /// A general assistant grounded in a user-supplied file.
    pub fn document_assistant() -> Self {
        Self {
            name: "Assistant".to_string(),
            greeting: "Hello! I've read your file. What would you like to know?".to_string(),
            preamble: "You are a specialized AI assistant. The user has provided a document for \
                       you to reference."
                .to_string(),
            rules: vec![
                "Use the provided document content as your primary knowledge base.".to_string(),
                "If the user asks a question that can be answered using the document, provide a detailed answer based on the text.".to_string(),
                "If the answer is NOT in the document, mention that the information isn't in the provided file, then offer a general helpful response based on your broader knowledge if appropriate.".to_string(),
                "Always be polite, professional, and concise.".to_string(),
            ],
            deflection: None,
            temperature: 0.7,
            model: Model::default(),
        }
    }

    /// Load a persona from YAML text and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let persona: Self = serde_yaml::from_str(yaml)?;
        persona.validate()?;
        Ok(persona)
    }

    /// Load a persona from a YAML file and validate it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read persona {}", path.display()), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the invariants the remote service and the template rely on.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::validation(
                format!("temperature must be within [0, 1], got {}", self.temperature),
                Some("temperature".to_string()),
            ));
        }
        if self.deflection.is_none()
            && self.rules.iter().any(|r| r.contains(DEFLECTION_PLACEHOLDER))
        {
            return Err(Error::validation(
                "a rule references {deflection} but no deflection is set",
                Some("deflection".to_string()),
            ));
        }
        Ok(())
    }

    /// Build the system instruction for a session grounded in `knowledge`.
    ///
    /// The knowledge text is embedded verbatim between `---` fences.
    pub fn system_instruction(&self, knowledge: &KnowledgeSource) -> String {
        let mut out = String::with_capacity(knowledge.len() + 1024);
        out.push_str(self.preamble.trim());
        out.push_str("\n\nREFERENCE MATERIAL:\n---\n");
        out.push_str(knowledge.as_str());
        if !knowledge.as_str().ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n");
        if !self.rules.is_empty() {
            out.push_str("\nRules:\n");
            for (idx, rule) in self.rules.iter().enumerate() {
                let rule = match &self.deflection {
                    Some(deflection) => rule.replace(DEFLECTION_PLACEHOLDER, deflection),
                    None => rule.clone(),
                };
                out.push_str(&format!("{}. {}\n", idx + 1, rule));
            }
        }
        out
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::restaurant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn restaurant_instruction_embeds_knowledge_verbatim() {
        let persona = Persona::restaurant();
        let knowledge = KnowledgeSource::from("Menu: Turkey £25 (G)");
        let instruction = persona.system_instruction(&knowledge);
        assert!(instruction.contains("---\nMenu: Turkey £25 (G)\n---\n"));
        assert!(instruction.contains(persona.deflection.as_deref().unwrap()));
        assert!(!instruction.contains(DEFLECTION_PLACEHOLDER));
        assert!(instruction.contains("allergy codes"));
        assert!(instruction.contains("\n1. "));
        assert!(instruction.contains("\n5. "));
    }

    #[test]
    fn restaurant_is_low_temperature() {
        let persona = Persona::restaurant();
        assert!(persona.temperature <= 0.3);
        assert!(persona.validate().is_ok());
    }

    #[test]
    fn document_assistant_has_no_deflection() {
        let persona = Persona::document_assistant();
        assert!(persona.deflection.is_none());
        assert!(persona.validate().is_ok());
        let instruction = persona.system_instruction(&KnowledgeSource::from("notes\n"));
        assert!(instruction.contains("---\nnotes\n---\n"));
    }

    #[test]
    fn yaml_persona() {
        let yaml = r#"
name: Trattoria
greeting: Ciao!
preamble: You are the host of a trattoria.
rules:
  - Only discuss the menu.
  - "Otherwise say: {deflection}"
deflection: Sorry, I only know the menu.
temperature: 0.1
model: gemini-2.5-flash
"#;
        let persona = Persona::from_yaml_str(yaml).unwrap();
        assert_eq!(persona.name, "Trattoria");
        assert_eq!(persona.model, Model::Known(KnownModel::Gemini25Flash));
        let instruction = persona.system_instruction(&KnowledgeSource::from("Pizza £12"));
        assert!(instruction.contains("2. Otherwise say: Sorry, I only know the menu."));
    }

    #[test]
    fn yaml_persona_defaults_model() {
        let yaml = "name: A\ngreeting: Hi\npreamble: P\nrules: []\ntemperature: 0.5\n";
        let persona = Persona::from_yaml_str(yaml).unwrap();
        assert_eq!(persona.model, Model::default());
        assert!(!persona.system_instruction(&KnowledgeSource::from("x")).contains("Rules:"));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut persona = Persona::restaurant();
        persona.temperature = 1.5;
        let err = persona.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_dangling_deflection_placeholder() {
        let mut persona = Persona::restaurant();
        persona.deflection = None;
        assert!(persona.validate().is_err());
    }
}
