//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the REPL runs with.

use std::fmt;
use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::error::Result;
use crate::ingest::{AcceptPolicy, ingest_path};
use crate::knowledge::KnowledgeSource;
use crate::persona::Persona;
use crate::types::Model;

/// Command-line arguments for the concierge-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: the persona's model)", "MODEL")]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-1.0 (default: the persona's)", "TEMP")]
    pub temperature: Option<String>,

    /// Document to ground the conversation in.
    #[arrrg(optional, "Text file to answer from (default: built-in menu)", "FILE")]
    pub knowledge: Option<String>,

    /// Persona definition.
    #[arrrg(optional, "YAML persona file", "FILE")]
    pub persona: Option<String>,

    /// Use the general document assistant instead of the restaurant concierge.
    #[arrrg(flag, "Act as a general document assistant")]
    pub assistant: bool,

    /// Also accept .json and .csv documents.
    #[arrrg(flag, "Accept .json and .csv documents as well")]
    pub lenient_upload: bool,

    /// Override the API endpoint.
    #[arrrg(optional, "API base URL", "URL")]
    pub base_url: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// An invalid combination or value of command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatArgsError {
    message: String,
}

impl ChatArgsError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ChatArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ChatArgsError {}

/// Where the persona comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PersonaSource {
    /// The built-in restaurant concierge.
    #[default]
    Restaurant,
    /// The built-in document assistant.
    DocumentAssistant,
    /// A YAML file.
    File(PathBuf),
}

/// Configuration for a chat run.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Persona to load.
    pub persona: PersonaSource,

    /// Overrides the persona's model.
    pub model: Option<Model>,

    /// Overrides the persona's temperature.
    pub temperature: Option<f32>,

    /// Document to ground the first session in.
    pub knowledge_path: Option<PathBuf>,

    /// Which documents `/load` accepts.
    pub accept_policy: AcceptPolicy,

    /// API base URL override.
    pub base_url: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Persona: restaurant concierge on the built-in menu
    /// - Upload policy: strict
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            persona: PersonaSource::Restaurant,
            model: None,
            temperature: None,
            knowledge_path: None,
            accept_policy: AcceptPolicy::Strict,
            base_url: None,
            use_color: true,
        }
    }

    /// Sets the persona source.
    pub fn with_persona(mut self, persona: PersonaSource) -> Self {
        self.persona = persona;
        self
    }

    /// Overrides the model.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    /// Overrides the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the document to start with.
    pub fn with_knowledge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.knowledge_path = Some(path.into());
        self
    }

    /// Sets the upload policy.
    pub fn with_accept_policy(mut self, policy: AcceptPolicy) -> Self {
        self.accept_policy = policy;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Resolve the persona, applying model and temperature overrides.
    pub fn load_persona(&self) -> Result<Persona> {
        let mut persona = match &self.persona {
            PersonaSource::Restaurant => Persona::restaurant(),
            PersonaSource::DocumentAssistant => Persona::document_assistant(),
            PersonaSource::File(path) => Persona::from_yaml_file(path)?,
        };
        if let Some(model) = &self.model {
            persona.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            persona.temperature = temperature;
        }
        persona.validate()?;
        Ok(persona)
    }

    /// Knowledge to start with when no file was given.
    ///
    /// Only the restaurant concierge has a built-in document; other personas
    /// wait for `/load`.
    pub fn default_knowledge(&self) -> Option<KnowledgeSource> {
        match self.persona {
            PersonaSource::Restaurant => Some(KnowledgeSource::builtin_menu()),
            _ => None,
        }
    }

    /// Knowledge for the first session: the `--knowledge` file if one was
    /// given, otherwise [`Self::default_knowledge`].
    ///
    /// An unreadable or refused file is returned as an error for the caller
    /// to report; it is not a reason to exit.
    pub async fn initial_knowledge(&self) -> Result<Option<KnowledgeSource>> {
        match &self.knowledge_path {
            Some(path) => Ok(Some(ingest_path(path, self.accept_policy).await?.into())),
            None => Ok(self.default_knowledge()),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = ChatArgsError;

    fn try_from(args: ChatArgs) -> std::result::Result<Self, Self::Error> {
        let persona = match (args.persona, args.assistant) {
            (Some(_), true) => {
                return Err(ChatArgsError::new(
                    "--persona and --assistant cannot be used together",
                ));
            }
            (Some(path), false) => PersonaSource::File(PathBuf::from(path)),
            (None, true) => PersonaSource::DocumentAssistant,
            (None, false) => PersonaSource::Restaurant,
        };
        let temperature = match args.temperature {
            Some(value) => match value.trim().parse::<f32>() {
                Ok(t) if (0.0..=1.0).contains(&t) => Some(t),
                _ => {
                    return Err(ChatArgsError::new(format!(
                        "--temperature expects a value between 0 and 1, got {value:?}"
                    )));
                }
            },
            None => None,
        };
        let accept_policy = if args.lenient_upload {
            AcceptPolicy::Uploader
        } else {
            AcceptPolicy::Strict
        };

        Ok(ChatConfig {
            persona,
            model: args.model.map(|s| s.parse::<Model>().unwrap_or(Model::Custom(s))),
            temperature,
            knowledge_path: args.knowledge.map(PathBuf::from),
            accept_policy,
            base_url: args.base_url,
            use_color: !args.no_color,
        })
    }
}
