//! Conversation state.
//!
//! The [`ConversationUpdater`] is the single writer of the message log.  Every
//! change publishes a fresh [`ConversationSnapshot`] on a `watch` channel;
//! readers hold a receiver and never see a half-applied update.  Messages that
//! did not change between two snapshots are the same `Arc`, so a reader can
//! tell what changed with a pointer comparison.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::observability::{TURNS_COMPLETED, TURNS_FAILED};
use crate::render::Renderer;
use crate::session::SessionManager;
use crate::types::{Message, MessageId};

/// Reply content after a failure to reach the remote service.
pub const NETWORK_ERROR_REPLY: &str =
    "Error: Could not process request. Please check your network connection.";

/// Reply content after any other failure.
pub const GENERIC_ERROR_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

/// How often a streaming turn checks the renderer's interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// The user-visible replacement for a reply that failed with `error`.
pub fn failure_reply(error: &Error) -> &'static str {
    if error.is_network() {
        NETWORK_ERROR_REPLY
    } else {
        GENERIC_ERROR_REPLY
    }
}

/// An immutable view of the conversation.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    /// Messages in display order.
    pub messages: Arc<[Arc<Message>]>,
    /// True while an assistant reply is streaming.
    pub in_progress: bool,
}

impl ConversationSnapshot {
    fn empty() -> Self {
        Self {
            messages: Arc::from(Vec::new()),
            in_progress: false,
        }
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The newest message.
    pub fn last(&self) -> Option<&Arc<Message>> {
        self.messages.last()
    }

    /// Look a message up by id.
    pub fn get(&self, id: MessageId) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| m.id == id)
    }
}

/// Ids of the pair of messages appended by [`ConversationUpdater::submit`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Submission {
    /// The user's message.
    pub user: MessageId,
    /// The assistant placeholder that fragments are appended to.
    pub reply: MessageId,
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub enum TurnStatus {
    /// The reply streamed to completion.
    Completed,
    /// The reply failed; its content is the fixed failure string.
    Failed(Error),
    /// The user stopped the reply; its content is what arrived before that.
    Interrupted,
}

/// Result of [`ConversationUpdater::run_turn`].
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Ids of the messages the turn appended.
    pub submission: Submission,
    /// How the reply ended.
    pub status: TurnStatus,
}

impl TurnOutcome {
    /// True if the reply completed.
    pub fn is_completed(&self) -> bool {
        matches!(self.status, TurnStatus::Completed)
    }
}

#[derive(Debug)]
struct OpenReply {
    id: MessageId,
    index: usize,
    buffer: String,
}

/// Single writer of the conversation log.
pub struct ConversationUpdater {
    messages: Vec<Arc<Message>>,
    open: Option<OpenReply>,
    tx: watch::Sender<ConversationSnapshot>,
}

impl ConversationUpdater {
    /// Create an empty conversation.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConversationSnapshot::empty());
        Self {
            messages: Vec::new(),
            open: None,
            tx,
        }
    }

    /// Create a conversation that opens with an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut this = Self::new();
        this.messages.push(Arc::new(Message::assistant(greeting)));
        this.publish();
        this
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.tx.borrow().clone()
    }

    /// The current messages.
    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// True while a reply is open.
    pub fn in_progress(&self) -> bool {
        self.open.is_some()
    }

    fn publish(&self) {
        let snapshot = ConversationSnapshot {
            messages: self.messages.iter().cloned().collect(),
            in_progress: self.open.is_some(),
        };
        self.tx.send_replace(snapshot);
    }

    /// Drop every message and start over with `greeting`, if any.
    pub fn reset(&mut self, greeting: Option<String>) -> Result<()> {
        if self.open.is_some() {
            return Err(Error::validation(
                "cannot reset while a reply is in progress",
                None,
            ));
        }
        self.messages.clear();
        if let Some(greeting) = greeting {
            self.messages.push(Arc::new(Message::assistant(greeting)));
        }
        self.publish();
        Ok(())
    }

    /// Append the user's message and an empty assistant placeholder.
    ///
    /// Fails if `text` is blank or another reply is still in progress.
    pub fn submit(&mut self, text: &str) -> Result<Submission> {
        if text.trim().is_empty() {
            return Err(Error::validation(
                "message text must not be empty",
                Some("text".to_string()),
            ));
        }
        if self.open.is_some() {
            return Err(Error::validation(
                "a reply is already in progress",
                None,
            ));
        }
        let user = Message::user(text);
        let reply = Message::assistant("");
        let submission = Submission {
            user: user.id,
            reply: reply.id,
        };
        self.messages.push(Arc::new(user));
        self.messages.push(Arc::new(reply));
        self.open = Some(OpenReply {
            id: submission.reply,
            index: self.messages.len() - 1,
            buffer: String::new(),
        });
        self.publish();
        Ok(submission)
    }

    fn open_reply(&mut self, id: MessageId) -> Result<&mut OpenReply> {
        match self.open.as_mut() {
            Some(open) if open.id == id => Ok(open),
            _ => Err(Error::validation(
                format!("message {id} is not an open reply"),
                Some("id".to_string()),
            )),
        }
    }

    fn replace_content(&mut self, index: usize, content: String) {
        let updated = self.messages[index].with_content(content);
        self.messages[index] = Arc::new(updated);
    }

    /// Append `fragment` to the open reply `id` and republish.
    pub fn apply_fragment(&mut self, id: MessageId, fragment: &str) -> Result<()> {
        let open = self.open_reply(id)?;
        if fragment.is_empty() {
            return Ok(());
        }
        open.buffer.push_str(fragment);
        let (index, content) = (open.index, open.buffer.clone());
        self.replace_content(index, content);
        self.publish();
        Ok(())
    }

    /// Close the open reply `id`; its content becomes immutable.
    pub fn finish(&mut self, id: MessageId) -> Result<()> {
        self.open_reply(id)?;
        self.open = None;
        TURNS_COMPLETED.click();
        self.publish();
        Ok(())
    }

    /// Close the open reply `id`, replacing its content with a fixed message.
    ///
    /// The user's message is kept.
    pub fn fail(&mut self, id: MessageId, error: &Error) -> Result<()> {
        let index = self.open_reply(id)?.index;
        tracing::error!(message_id = %id, error = %error, "assistant reply failed");
        self.replace_content(index, failure_reply(error).to_string());
        self.open = None;
        TURNS_FAILED.click();
        self.publish();
        Ok(())
    }

    /// Close the open reply `id`, keeping whatever has arrived.
    pub fn interrupt(&mut self, id: MessageId) -> Result<()> {
        self.open_reply(id)?;
        tracing::info!(message_id = %id, "assistant reply interrupted");
        self.open = None;
        self.publish();
        Ok(())
    }

    /// Submit `text`, stream the reply from `manager`, and close it.
    ///
    /// The renderer's interrupt flag is checked between fragments and while
    /// the stream is quiet; an interrupted reply keeps what has arrived.
    /// Only a rejected submission is returned as an error.  Transport and
    /// session failures are recorded in the conversation and reported in the
    /// outcome.
    pub async fn run_turn(
        &mut self,
        manager: &SessionManager,
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        let submission = self.submit(text)?;
        let id = submission.reply;
        if let Some(reply) = self.messages.last() {
            renderer.start_reply(reply);
        }

        let mut stream = match manager.send_message_stream(text) {
            Ok(stream) => stream,
            Err(err) => return self.fail_turn(submission, err, renderer),
        };
        loop {
            if renderer.should_interrupt() {
                self.interrupt(id)?;
                renderer.print_interrupted();
                return Ok(TurnOutcome {
                    submission,
                    status: TurnStatus::Interrupted,
                });
            }
            // A stalled stream must not hold off the interrupt check.
            let item = tokio::select! {
                biased;
                item = stream.next() => item,
                _ = tokio::time::sleep(INTERRUPT_POLL) => continue,
            };
            match item {
                Some(Ok(fragment)) => {
                    self.apply_fragment(id, &fragment)?;
                    renderer.print_fragment(&fragment);
                }
                Some(Err(err)) => return self.fail_turn(submission, err, renderer),
                None => break,
            }
        }
        self.finish(id)?;
        renderer.finish_reply();
        Ok(TurnOutcome {
            submission,
            status: TurnStatus::Completed,
        })
    }

    fn fail_turn(
        &mut self,
        submission: Submission,
        err: Error,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        self.fail(submission.reply, &err)?;
        renderer.fail_reply(failure_reply(&err));
        Ok(TurnOutcome {
            submission,
            status: TurnStatus::Failed(err),
        })
    }
}

impl Default for ConversationUpdater {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn greeting_is_first_message() {
        let conversation = ConversationUpdater::with_greeting("Hello!");
        let snapshot = conversation.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::Assistant);
        assert_eq!(snapshot.messages[0].content, "Hello!");
        assert!(!snapshot.in_progress);
    }

    #[test]
    fn submit_appends_user_then_placeholder() {
        let mut conversation = ConversationUpdater::new();
        let submission = conversation.submit("Is the turkey gluten free?").unwrap();
        let snapshot = conversation.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.messages[0].id, submission.user);
        assert_eq!(snapshot.messages[0].role, Role::User);
        assert_eq!(snapshot.messages[1].id, submission.reply);
        assert_eq!(snapshot.messages[1].content, "");
        assert_ne!(submission.user, submission.reply);
        assert!(snapshot.in_progress);
    }

    #[test]
    fn submit_rejects_blank_and_overlap() {
        let mut conversation = ConversationUpdater::new();
        assert!(conversation.submit("  \n").unwrap_err().is_validation());
        conversation.submit("first").unwrap();
        assert!(conversation.submit("second").unwrap_err().is_validation());
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn fragments_only_replace_the_placeholder() {
        let mut conversation = ConversationUpdater::with_greeting("Hello!");
        let submission = conversation.submit("turkey?").unwrap();
        let before = conversation.snapshot();
        conversation.apply_fragment(submission.reply, "The turkey").unwrap();
        let after = conversation.snapshot();

        assert!(Arc::ptr_eq(&before.messages[0], &after.messages[0]));
        assert!(Arc::ptr_eq(&before.messages[1], &after.messages[1]));
        assert!(!Arc::ptr_eq(&before.messages[2], &after.messages[2]));
        assert_eq!(after.messages[2].id, submission.reply);
        assert_eq!(after.messages[2].content, "The turkey");
        assert_eq!(before.messages[2].content, "");
    }

    #[test]
    fn empty_fragment_does_not_republish() {
        let mut conversation = ConversationUpdater::new();
        let submission = conversation.submit("hi").unwrap();
        let rx = conversation.subscribe();
        conversation.apply_fragment(submission.reply, "").unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn finish_clears_in_progress() {
        let mut conversation = ConversationUpdater::new();
        let submission = conversation.submit("hi").unwrap();
        conversation.apply_fragment(submission.reply, "Hello").unwrap();
        conversation.finish(submission.reply).unwrap();
        assert!(!conversation.in_progress());
        assert!(!conversation.snapshot().in_progress);
        assert!(conversation.apply_fragment(submission.reply, "late").is_err());
        assert_eq!(conversation.snapshot().messages[1].content, "Hello");
    }

    #[test]
    fn fail_uses_fixed_strings() {
        let mut conversation = ConversationUpdater::new();
        let first = conversation.submit("hi").unwrap();
        conversation.apply_fragment(first.reply, "partial").unwrap();
        conversation
            .fail(first.reply, &Error::connection("refused", None))
            .unwrap();
        let second = conversation.submit("again").unwrap();
        conversation
            .fail(second.reply, &Error::bad_request("nope"))
            .unwrap();

        let snapshot = conversation.snapshot();
        assert_eq!(snapshot.messages[0].content, "hi");
        assert_eq!(snapshot.messages[1].content, NETWORK_ERROR_REPLY);
        assert_eq!(snapshot.messages[3].content, GENERIC_ERROR_REPLY);
        assert!(!snapshot.in_progress);
    }

    #[test]
    fn interrupt_keeps_partial_reply() {
        let mut conversation = ConversationUpdater::new();
        let submission = conversation.submit("hi").unwrap();
        conversation.apply_fragment(submission.reply, "The tur").unwrap();
        conversation.interrupt(submission.reply).unwrap();
        assert!(!conversation.in_progress());
        assert_eq!(conversation.snapshot().messages[1].content, "The tur");
    }

    #[test]
    fn wrong_id_is_rejected() {
        let mut conversation = ConversationUpdater::new();
        let submission = conversation.submit("hi").unwrap();
        assert!(conversation.apply_fragment(submission.user, "x").is_err());
        assert!(conversation.finish(submission.user).is_err());
        assert!(conversation.in_progress());
    }

    #[test]
    fn reset_replaces_log() {
        let mut conversation = ConversationUpdater::with_greeting("Hello!");
        let submission = conversation.submit("hi").unwrap();
        assert!(conversation.reset(None).is_err());
        conversation.finish(submission.reply).unwrap();
        conversation.reset(Some("Welcome back!".to_string())).unwrap();
        let snapshot = conversation.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.messages[0].content, "Welcome back!");
    }

    #[tokio::test]
    async fn readers_observe_updates() {
        let mut conversation = ConversationUpdater::new();
        let mut rx = conversation.subscribe();
        let submission = conversation.submit("hi").unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().in_progress);
        conversation.apply_fragment(submission.reply, "Hello").unwrap();
        conversation.finish(submission.reply).unwrap();
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert!(!snapshot.in_progress);
        assert_eq!(snapshot.get(submission.reply).unwrap().content, "Hello");
    }
}
