//! Grounded chat sessions.
//!
//! A [`SessionManager`] owns at most one [`Session`] at a time.  A session bakes
//! the persona's rules and the grounding document into a fixed system
//! instruction, and keeps the turn history that is resent with every request.
//! Replies come back as a [`ReplyStream`] of non-empty text fragments.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Instant;

use futures::stream::{self, Stream, TryStreamExt};

use crate::client::ChunkStream;
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeSource;
use crate::observability::{
    SESSIONS_STARTED, STREAM_DURATION, STREAM_EMPTY_CHUNKS, STREAM_ERRORS, STREAM_FRAGMENTS,
    STREAM_TTFB,
};
use crate::persona::Persona;
use crate::transport::ChatTransport;
use crate::types::{Content, GenerateContentResponse, Model};

/// Message for operations attempted before [`SessionManager::start_session`].
pub const UNINITIALIZED_MESSAGE: &str = "Chat session not initialized. Please upload a file first.";

/// Parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Model serving the session.
    pub model: Model,
    /// Persona rules with the grounding document embedded.
    pub system_instruction: String,
    /// Sampling temperature.
    pub temperature: f32,
}

type History = Arc<Mutex<Vec<Content>>>;

/// One grounded conversation with the remote service.
#[derive(Debug)]
pub struct Session {
    config: Arc<SessionConfig>,
    knowledge: KnowledgeSource,
    history: History,
}

impl Session {
    /// The session's fixed configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The document this session is grounded in.
    pub fn knowledge(&self) -> &KnowledgeSource {
        &self.knowledge
    }

    /// Number of completed turns (user plus model content pairs).
    pub fn turns(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            / 2
    }

    /// Copy of the committed turn history.
    pub fn history(&self) -> Vec<Content> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owns the active session and opens reply streams against it.
pub struct SessionManager {
    transport: Arc<dyn ChatTransport>,
    persona: Persona,
    session: Option<Session>,
}

impl SessionManager {
    /// Create a manager with no active session.
    pub fn new(transport: Arc<dyn ChatTransport>, persona: Persona) -> Self {
        Self {
            transport,
            persona,
            session: None,
        }
    }

    /// The persona new sessions are built from.
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Replace the persona.  Takes effect at the next [`Self::start_session`].
    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True once a session has been started.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Start a fresh session grounded in `knowledge`, discarding any previous one.
    ///
    /// This never contacts the remote service; a missing credential or an
    /// unreachable endpoint surfaces on the first [`Self::send_message_stream`].
    pub fn start_session(&mut self, knowledge: impl Into<KnowledgeSource>) -> &Session {
        let knowledge = knowledge.into();
        let config = SessionConfig {
            model: self.persona.model.clone(),
            system_instruction: self.persona.system_instruction(&knowledge),
            temperature: self.persona.temperature,
        };
        SESSIONS_STARTED.click();
        tracing::info!(
            model = %config.model,
            temperature = config.temperature,
            knowledge = knowledge.name().unwrap_or("<inline>"),
            knowledge_bytes = knowledge.len(),
            replaced = self.session.is_some(),
            "chat session started"
        );
        self.session.insert(Session {
            config: Arc::new(config),
            knowledge,
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Start a fresh session on the current knowledge source.
    pub fn restart(&mut self) -> Result<&Session> {
        let knowledge = match &self.session {
            Some(session) => session.knowledge.clone(),
            None => return Err(Error::uninitialized(UNINITIALIZED_MESSAGE)),
        };
        Ok(self.start_session(knowledge))
    }

    /// Send `user_text` and return the reply as a stream of text fragments.
    ///
    /// The request is issued when the stream is first polled.  The caller must
    /// not have two reply streams in flight at once.
    pub fn send_message_stream(&self, user_text: &str) -> Result<ReplyStream> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::uninitialized(UNINITIALIZED_MESSAGE))?;
        if user_text.trim().is_empty() {
            return Err(Error::validation(
                "message text must not be empty",
                Some("user_text".to_string()),
            ));
        }

        let user_turn = Content::user(user_text);
        let mut contents = session.history();
        contents.push(user_turn.clone());
        tracing::debug!(
            model = %session.config.model,
            history = contents.len() - 1,
            "opening reply stream"
        );

        let transport = Arc::clone(&self.transport);
        let config = Arc::clone(&session.config);
        let open = async move { transport.open_stream(&config, contents).await };
        let chunks: ChunkStream = Box::pin(stream::once(open).try_flatten());

        Ok(ReplyStream {
            inner: chunks,
            history: Arc::clone(&session.history),
            user_turn: Some(user_turn),
            reply: String::new(),
            fragments: 0,
            started: None,
            done: false,
        })
    }
}

/// The reply to one user message, as a finite stream of non-empty fragments.
///
/// Chunks without text are skipped.  When the stream ends cleanly the turn is
/// committed to the session history; if it fails, or is dropped early, the
/// history is left untouched.  Once it has returned `None` or an error it
/// yields nothing further.
pub struct ReplyStream {
    inner: ChunkStream,
    history: History,
    user_turn: Option<Content>,
    reply: String,
    fragments: u64,
    started: Option<Instant>,
    done: bool,
}

impl ReplyStream {
    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.reply
    }

    fn commit(&mut self) {
        let Some(user_turn) = self.user_turn.take() else {
            return;
        };
        if self.reply.is_empty() {
            tracing::warn!("reply stream ended without text; turn not recorded");
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(user_turn);
        history.push(Content::model(self.reply.clone()));
    }

    fn fragment_of(chunk: &GenerateContentResponse) -> Option<String> {
        chunk.text().filter(|text| !text.is_empty())
    }
}

impl Stream for ReplyStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let Some(fragment) = Self::fragment_of(&chunk) else {
                        STREAM_EMPTY_CHUNKS.click();
                        continue;
                    };
                    if self.fragments == 0
                        && let Some(started) = self.started
                    {
                        STREAM_TTFB.add(started.elapsed().as_secs_f64());
                    }
                    STREAM_FRAGMENTS.click();
                    self.fragments += 1;
                    self.reply.push_str(&fragment);
                    return Poll::Ready(Some(Ok(fragment)));
                }
                Poll::Ready(Some(Err(err))) => {
                    STREAM_ERRORS.click();
                    tracing::warn!(
                        error = %err,
                        fragments = self.fragments,
                        "reply stream failed"
                    );
                    self.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    if let Some(started) = self.started {
                        STREAM_DURATION.add(started.elapsed().as_secs_f64());
                    }
                    tracing::info!(
                        fragments = self.fragments,
                        chars = self.reply.chars().count(),
                        "reply stream complete"
                    );
                    self.done = true;
                    self.commit();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::transport::{Script, ScriptedTransport};

    fn manager(scripts: Vec<Script>) -> (Arc<ScriptedTransport>, SessionManager) {
        let transport = Arc::new(ScriptedTransport::new(scripts));
        let manager = SessionManager::new(transport.clone(), Persona::restaurant());
        (transport, manager)
    }

    async fn collect(stream: ReplyStream) -> Vec<Result<String>> {
        stream.collect().await
    }

    #[test]
    fn send_before_start_is_uninitialized() {
        let (_, manager) = manager(vec![]);
        let err = match manager.send_message_stream("hello") {
            Ok(_) => panic!("no session yet"),
            Err(err) => err,
        };
        assert!(err.is_uninitialized());
        assert_eq!(err.user_message(), UNINITIALIZED_MESSAGE);
    }

    #[test]
    fn restart_requires_session() {
        let (_, mut manager) = manager(vec![]);
        assert!(manager.restart().unwrap_err().is_uninitialized());
    }

    #[test]
    fn start_session_embeds_grounding() {
        let (_, mut manager) = manager(vec![]);
        let session = manager.start_session("Menu: Turkey £25 (G)");
        assert!(
            session
                .config()
                .system_instruction
                .contains("Menu: Turkey £25 (G)")
        );
        assert!((session.config().temperature - 0.2).abs() < f32::EPSILON);
        assert!(manager.is_active());
    }

    #[test]
    fn persona_change_applies_to_next_session() {
        let (_, mut manager) = manager(vec![]);
        manager.start_session("menu");
        manager.set_persona(Persona::document_assistant());
        let temperature = manager.session().map(|s| s.config().temperature);
        assert_eq!(temperature, Some(0.2));
        let session = manager.start_session("notes");
        assert!((session.config().temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn request_is_lazy() {
        let (transport, mut manager) = manager(vec![Script::reply(["Hi"])]);
        manager.start_session("menu");
        let stream = manager.send_message_stream("hello").unwrap();
        assert!(transport.requests().is_empty());
        assert_eq!(collect(stream).await.len(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn skips_empty_chunks() {
        let (_, mut manager) = manager(vec![Script::Reply(vec![
            None,
            Some("The turkey".to_string()),
            Some(String::new()),
            Some(" is £25.".to_string()),
        ])]);
        manager.start_session("menu");
        let fragments: Vec<String> = collect(manager.send_message_stream("turkey?").unwrap())
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(fragments, vec!["The turkey", " is £25."]);
    }

    #[tokio::test]
    async fn completed_turn_is_resent() {
        let (transport, mut manager) = manager(vec![
            Script::reply(["£25"]),
            Script::reply(["Yes"]),
        ]);
        manager.start_session("menu");
        collect(manager.send_message_stream("How much is the turkey?").unwrap()).await;
        assert_eq!(manager.session().unwrap().turns(), 1);
        collect(manager.send_message_stream("Does it contain gluten?").unwrap()).await;

        let requests = transport.requests();
        assert_eq!(requests[0].contents.len(), 1);
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].contents[1].text().as_deref(), Some("£25"));
        assert_eq!(manager.session().unwrap().turns(), 2);
    }

    #[tokio::test]
    async fn failed_turn_is_not_committed() {
        let (_, mut manager) = manager(vec![Script::fail_after(
            ["The tur"],
            Error::connection("reset", None),
        )]);
        manager.start_session("menu");
        let mut stream = manager.send_message_stream("turkey?").unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "The tur");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert_eq!(manager.session().unwrap().turns(), 0);
    }

    #[tokio::test]
    async fn open_failure_is_first_item() {
        let (_, mut manager) = manager(vec![Script::FailToOpen(Error::authentication(
            "no key",
        ))]);
        manager.start_session("menu");
        let items = collect(manager.send_message_stream("hi").unwrap()).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_authentication());
    }

    #[tokio::test]
    async fn restart_clears_history() {
        let (_, mut manager) = manager(vec![Script::reply(["ok"])]);
        manager.start_session(KnowledgeSource::named("menu.md", "menu"));
        collect(manager.send_message_stream("hi").unwrap()).await;
        let session = manager.restart().unwrap();
        assert_eq!(session.turns(), 0);
        assert_eq!(session.knowledge().name(), Some("menu.md"));
    }

    #[test]
    fn rejects_blank_text() {
        let (_, mut manager) = manager(vec![]);
        manager.start_session("menu");
        assert!(manager.send_message_stream("   ").is_err());
    }
}
