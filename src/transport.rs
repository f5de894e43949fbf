//! The seam between a session and the remote chat service.
//!
//! A [`ChatTransport`] turns a session's fixed configuration plus the turn
//! history into a stream of response chunks.  [`Gemini`] is the production
//! implementation; [`ScriptedTransport`] replays canned replies and failures.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream;

use crate::client::{ChunkStream, Gemini};
use crate::error::{Error, Result};
use crate::session::SessionConfig;
use crate::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};

/// Opens one reply stream per call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `contents` (history plus the new user turn) under `config`.
    async fn open_stream(&self, config: &SessionConfig, contents: Vec<Content>)
    -> Result<ChunkStream>;
}

/// Build the wire request for one turn.
pub fn build_request(config: &SessionConfig, contents: Vec<Content>) -> GenerateContentRequest {
    GenerateContentRequest::new(contents)
        .with_system_instruction(config.system_instruction.clone())
        .with_generation_config(GenerationConfig::with_temperature(config.temperature))
}

#[async_trait]
impl ChatTransport for Gemini {
    async fn open_stream(
        &self,
        config: &SessionConfig,
        contents: Vec<Content>,
    ) -> Result<ChunkStream> {
        let request = build_request(config, contents);
        self.stream(&config.model, &request).await
    }
}

////////////////////////////////////////// ScriptedTransport //////////////////////////////////////////

/// One canned response for [`ScriptedTransport`].
#[derive(Debug)]
pub enum Script {
    /// Yield these chunks then end cleanly.  `None` is a chunk with no text.
    Reply(Vec<Option<String>>),
    /// Yield these chunks then fail with `error`.
    FailAfter(Vec<Option<String>>, Error),
    /// Fail before any chunk is produced.
    FailToOpen(Error),
}

impl Script {
    /// A clean reply made of the given text fragments.
    pub fn reply<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reply(fragments.into_iter().map(|s| Some(s.into())).collect())
    }

    /// A reply that fails after the given text fragments.
    pub fn fail_after<I, S>(fragments: I, error: Error) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FailAfter(fragments.into_iter().map(|s| Some(s.into())).collect(), error)
    }
}

/// A deterministic transport that plays back [`Script`]s in order.
///
/// Every request is recorded so callers can inspect what would have been sent.
/// Running out of scripts is an error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl ScriptedTransport {
    /// Create a transport with the given scripts.
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another script.
    pub fn push(&self, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of scripts not yet played.
    pub fn remaining(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn chunk(text: Option<String>) -> Result<GenerateContentResponse> {
    Ok(match text {
        Some(text) => GenerateContentResponse::from_text(text),
        None => GenerateContentResponse::default(),
    })
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        config: &SessionConfig,
        contents: Vec<Content>,
    ) -> Result<ChunkStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(build_request(config, contents));
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| Error::unknown("no scripted reply left"))?;
        match script {
            Script::Reply(chunks) => Ok(Box::pin(stream::iter(chunks.into_iter().map(chunk)))),
            Script::FailAfter(chunks, error) => {
                let items = chunks
                    .into_iter()
                    .map(chunk)
                    .chain(std::iter::once(Err(error)));
                Ok(Box::pin(stream::iter(items)))
            }
            Script::FailToOpen(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::types::Model;

    fn config() -> SessionConfig {
        SessionConfig {
            model: Model::default(),
            system_instruction: "Answer from the menu.".to_string(),
            temperature: 0.2,
        }
    }

    #[test]
    fn request_carries_instruction_and_temperature() {
        let request = build_request(&config(), vec![Content::user("Hi")]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Answer from the menu."
        );
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[tokio::test]
    async fn plays_scripts_in_order() {
        let transport = ScriptedTransport::new([
            Script::reply(["a", "b"]),
            Script::FailToOpen(Error::connection("offline", None)),
        ]);
        let mut first = transport
            .open_stream(&config(), vec![Content::user("one")])
            .await
            .unwrap();
        let mut texts = Vec::new();
        while let Some(chunk) = first.next().await {
            texts.push(chunk.unwrap().text().unwrap());
        }
        assert_eq!(texts, vec!["a", "b"]);

        let err = match transport.open_stream(&config(), vec![]).await {
            Ok(_) => panic!("second script should fail"),
            Err(err) => err,
        };
        assert!(err.is_connection());
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn fail_after_yields_then_errors() {
        let transport = ScriptedTransport::new([Script::fail_after(
            ["The turkey"],
            Error::streaming("reset", None),
        )]);
        let chunks: Vec<_> = transport
            .open_stream(&config(), vec![])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert!(chunks[1].is_err());
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let transport = ScriptedTransport::default();
        assert!(transport.open_stream(&config(), vec![]).await.is_err());
    }
}
