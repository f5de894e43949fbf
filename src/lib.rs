//! A grounded, streaming concierge chat on top of the Gemini API.
//!
//! A [`SessionManager`] grounds a session in a [`KnowledgeSource`] under a
//! [`Persona`]; each user message comes back as a [`ReplyStream`] of text
//! fragments, which a [`ConversationUpdater`] folds into the message log.

// Public modules
pub mod chat;
pub mod client;
pub mod conversation;
pub mod error;
pub mod ingest;
pub mod knowledge;
pub mod persona;
pub mod render;
pub mod session;
pub mod sse;
pub mod transport;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use client::{ChunkStream, Gemini};
pub use conversation::{
    ConversationSnapshot, ConversationUpdater, GENERIC_ERROR_REPLY, NETWORK_ERROR_REPLY,
    Submission, TurnOutcome, TurnStatus,
};
pub use error::{Error, Result};
pub use ingest::AcceptPolicy;
pub use knowledge::KnowledgeSource;
pub use observability::register_biometrics;
pub use persona::Persona;
pub use render::{PlainTextRenderer, Renderer};
pub use session::{ReplyStream, Session, SessionConfig, SessionManager};
pub use transport::{ChatTransport, Script, ScriptedTransport};
pub use types::*;
