//! Interactive concierge chat.
//!
//! This module provides the pieces the `concierge-chat` REPL is built from:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing and help
//!
//! The conversation itself lives in [`crate::conversation`] and is rendered
//! through [`crate::render`].

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatArgsError, ChatConfig, PersonaSource};
