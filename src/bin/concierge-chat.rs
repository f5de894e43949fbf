//! Interactive concierge chat in the terminal.
//!
//! # Usage
//!
//! ```bash
//! # The 1947 London concierge on its built-in Christmas menu
//! GEMINI_API_KEY=... concierge-chat
//!
//! # Ground it in a different menu
//! concierge-chat --knowledge menus/new-year.md
//!
//! # A general assistant for any text file
//! concierge-chat --assistant --knowledge notes.txt
//!
//! # A custom persona
//! concierge-chat --persona trattoria.yaml --knowledge trattoria.md
//! ```
//!
//! Set `RUST_LOG=concierge=info` to see session and stream events on stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use concierge::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, help_text, parse_command,
};
use concierge::ingest::ingest_path;
use concierge::{ConversationUpdater, Gemini, SessionManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("concierge-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let persona = config.load_persona()?;

    let (knowledge, startup_error) = match config.initial_knowledge().await {
        Ok(knowledge) => (knowledge, None),
        Err(err) => {
            tracing::info!(error = %err, "initial document not loaded");
            (None, Some(err.user_message()))
        }
    };

    let client = Gemini::with_options(None, config.base_url.clone(), None)?;
    if !client.has_api_key() {
        tracing::warn!("no API key found; set GEMINI_API_KEY");
    }
    let mut manager = SessionManager::new(Arc::new(client), persona.clone());
    if let Some(knowledge) = knowledge {
        manager.start_session(knowledge);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let mut renderer = PlainTextRenderer::with_color(config.use_color)
        .with_assistant_name(persona.name.clone())
        .with_interrupt(interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    if let Some(message) = startup_error {
        renderer.print_error(&message);
    }
    let mut conversation = if manager.is_active() {
        ConversationUpdater::with_greeting(persona.greeting.clone())
    } else {
        renderer.print_info("Use /load <file> to choose a document to talk about.");
        ConversationUpdater::new()
    };
    for message in conversation.messages() {
        renderer.print_message(message);
    }
    renderer.print_info("Type /help for commands, /quit to exit\n");

    loop {
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Load(path) => {
                            match ingest_path(&path, config.accept_policy).await {
                                Ok(file) => {
                                    let name = file.name.clone();
                                    manager.start_session(file);
                                    conversation.reset(Some(manager.persona().greeting.clone()))?;
                                    renderer.print_info(&format!("Loaded {name}."));
                                    for message in conversation.messages() {
                                        renderer.print_message(message);
                                    }
                                }
                                Err(err) => {
                                    tracing::info!(path = %path, error = %err, "load failed");
                                    renderer.print_error(&err.user_message());
                                }
                            }
                        }
                        ChatCommand::Reset => match manager.restart() {
                            Ok(_) => {
                                conversation.reset(Some(manager.persona().greeting.clone()))?;
                                renderer.print_info("Conversation cleared.");
                                for message in conversation.messages() {
                                    renderer.print_message(message);
                                }
                            }
                            Err(err) => renderer.print_error(&err.user_message()),
                        },
                        ChatCommand::History => {
                            for message in conversation.snapshot().messages.iter() {
                                renderer.print_message(message);
                            }
                        }
                        ChatCommand::ShowConfig => print_config(&manager),
                        ChatCommand::Invalid(message) => renderer.print_error(&message),
                    }
                    continue;
                }

                if !manager.is_active() {
                    renderer.print_error(concierge::session::UNINITIALIZED_MESSAGE);
                    continue;
                }
                if let Err(err) = conversation.run_turn(&manager, line, &mut renderer).await {
                    renderer.print_error(&err.user_message());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn print_config(manager: &SessionManager) {
    let persona = manager.persona();
    println!("    Current Configuration:");
    println!("      Persona: {}", persona.name);
    match manager.session() {
        Some(session) => {
            let config = session.config();
            println!("      Model: {}", config.model);
            println!("      Temperature: {:.2}", config.temperature);
            let knowledge = session.knowledge();
            println!(
                "      Document: {} ({} bytes)",
                knowledge.name().unwrap_or("(inline)"),
                knowledge.len()
            );
            println!("      Turns: {}", session.turns());
        }
        None => {
            println!("      Model: {}", persona.model);
            println!("      Temperature: {:.2}", persona.temperature);
            println!("      Document: (none loaded)");
        }
    }
}
