//! Terminal rendering of the conversation.
//!
//! A [`Renderer`] receives whole messages (greetings, history, the user's own
//! line) and the fragments of the reply being streamed.  [`PlainTextRenderer`]
//! writes them to a terminal with role styling and `HH:MM` timestamps.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{Message, Role};
use crate::utils::time::clock;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering conversation output.
pub trait Renderer: Send {
    /// Print a complete message.
    fn print_message(&mut self, message: &Message);

    /// Called once before the fragments of an assistant reply.
    fn start_reply(&mut self, message: &Message);

    /// Print one fragment of the reply being streamed.
    fn print_fragment(&mut self, text: &str);

    /// Called when the reply finished cleanly.
    fn finish_reply(&mut self);

    /// Called when the reply failed; `content` is what the message now says.
    fn fail_reply(&mut self, content: &str);

    /// Print an error that is not part of the conversation.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the user interrupts the reply.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Discards everything.
impl Renderer for () {
    fn print_message(&mut self, _: &Message) {}
    fn start_reply(&mut self, _: &Message) {}
    fn print_fragment(&mut self, _: &str) {}
    fn finish_reply(&mut self) {}
    fn fail_reply(&mut self, _: &str) {}
    fn print_error(&mut self, _: &str) {}
    fn print_info(&mut self, _: &str) {}
}

/// Line-oriented renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    assistant_name: String,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a renderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a renderer on stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::to_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer on an arbitrary writer.
    pub fn to_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            assistant_name: "Concierge".to_string(),
            line_start: true,
            interrupted: None,
        }
    }

    /// Sets the label shown for assistant messages.
    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn header(&self, message: &Message) -> String {
        let (label, style) = match message.role {
            Role::User => ("You", ANSI_CYAN),
            Role::Assistant => (self.assistant_name.as_str(), ANSI_GREEN),
        };
        let stamp = self.styled(ANSI_DIM, &format!("[{}]", clock(&message.timestamp)));
        let label = self.styled(&format!("{ANSI_BOLD}{style}"), label);
        format!("{stamp} {label}: ")
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_message(&mut self, message: &Message) {
        self.end_line();
        let header = self.header(message);
        self.write(&header);
        self.write(&message.content);
        self.end_line();
    }

    fn start_reply(&mut self, message: &Message) {
        self.end_line();
        let header = self.header(message);
        self.write(&header);
    }

    fn print_fragment(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_reply(&mut self) {
        self.end_line();
    }

    fn fail_reply(&mut self, content: &str) {
        self.end_line();
        let line = self.styled(ANSI_RED, content);
        self.write(&line);
        self.write("\n");
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write(&line);
        self.write("\n");
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(info);
        self.end_line();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        let line = self.styled(ANSI_DIM, "[interrupted]");
        self.write(&line);
        self.write("\n");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
