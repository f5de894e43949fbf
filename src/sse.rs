//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! `streamGenerateContent?alt=sse` answers with one `data:` payload per event,
//! each holding a complete [`GenerateContentResponse`] chunk.  This module turns
//! the raw byte stream into a stream of those chunks.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::observability::STREAM_BYTES;
use crate::{Error, GenerateContentResponse, Result};

/// Process a stream of bytes into a stream of response chunks.
///
/// Bytes are buffered until a full event (terminated by a blank line) is
/// available, so multi-byte characters split across network reads decode
/// correctly.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });
    process_events(stream)
}

/// The transport-independent half of [`process_sse`].
pub(crate) fn process_events<S>(stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                // First check if we have a complete event in the buffer
                if let Some((event, remaining)) = extract_event(&buffer) {
                    buffer = remaining;
                    match event {
                        Some(event) => return Some((event, (stream, buffer, false))),
                        None => continue,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, true)));
                    }
                    None => {
                        // End of stream; a final event may lack its blank line.
                        if !buffer.iter().all(u8::is_ascii_whitespace) {
                            buffer.extend_from_slice(b"\n\n");
                            if let Some((Some(event), _)) = extract_event(&buffer) {
                                return Some((event, (stream, Vec::new(), true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Extract a complete SSE event from the front of `buffer`.
///
/// Returns `None` when no complete event is buffered yet.  The inner `Option`
/// is `None` for events that carry no data (comments, keep-alives).
fn extract_event(buffer: &[u8]) -> Option<(Option<Result<GenerateContentResponse>>, Vec<u8>)> {
    let split = buffer.windows(2).position(|w| w == b"\n\n")?;
    let rest = buffer[split + 2..].to_vec();
    let event_text = match std::str::from_utf8(&buffer[..split]) {
        Ok(text) => text,
        Err(e) => {
            return Some((
                Some(Err(Error::encoding(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                ))),
                rest,
            ));
        }
    };

    let data = event_text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>();
    if data.is_empty() {
        return Some((None, rest));
    }
    let data = data.join("\n");
    Some((Some(parse_data(&data)), rest))
}

fn parse_data(data: &str) -> Result<GenerateContentResponse> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        let detail = envelope.error;
        return Err(Error::api(
            detail.code.unwrap_or(500),
            detail.status,
            detail
                .message
                .unwrap_or_else(|| "error event in stream".to_string()),
        ));
    }
    serde_json::from_str::<GenerateContentResponse>(data).map_err(|e| {
        Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunk(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":{}}}],\"role\":\"model\"}},\"index\":0}}]}}\r\n\r\n",
            serde_json::to_string(text).unwrap()
        )
    }

    fn bytes_of(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    #[tokio::test]
    async fn parse_single_chunk() {
        let data = chunk("Hello");
        let mut sse = Box::pin(process_events(bytes_of(vec![data.into_bytes()])));
        let event = sse.next().await.unwrap().unwrap();
        assert_eq!(event.text().as_deref(), Some("Hello"));
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn parse_multiple_chunks() {
        let data = format!("{}{}", chunk("The turkey"), chunk(" is £25."));
        let mut sse = Box::pin(process_events(bytes_of(vec![data.into_bytes()])));
        let first = sse.next().await.unwrap().unwrap();
        let second = sse.next().await.unwrap().unwrap();
        assert_eq!(first.text().as_deref(), Some("The turkey"));
        assert_eq!(second.text().as_deref(), Some(" is £25."));
    }

    #[tokio::test]
    async fn handle_split_multibyte_character() {
        let data = chunk("£25").into_bytes();
        let pound = data.iter().position(|b| *b == 0xc2).unwrap();
        let parts = vec![data[..pound + 1].to_vec(), data[pound + 1..].to_vec()];
        let mut sse = Box::pin(process_events(bytes_of(parts)));
        let event = sse.next().await.unwrap().unwrap();
        assert_eq!(event.text().as_deref(), Some("£25"));
    }

    #[tokio::test]
    async fn skip_comment_events() {
        let data = format!(": keep-alive\n\n{}", chunk("Hi"));
        let mut sse = Box::pin(process_events(bytes_of(vec![data.into_bytes()])));
        let event = sse.next().await.unwrap().unwrap();
        assert_eq!(event.text().as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn final_event_without_blank_line() {
        let data = chunk("tail");
        let trimmed = data.trim_end().to_string();
        let mut sse = Box::pin(process_events(bytes_of(vec![trimmed.into_bytes()])));
        let event = sse.next().await.unwrap().unwrap();
        assert_eq!(event.text().as_deref(), Some("tail"));
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn handle_malformed_event() {
        let data = b"data: {not json\n\n".to_vec();
        let mut sse = Box::pin(process_events(bytes_of(vec![data])));
        let event = sse.next().await.unwrap();
        assert!(matches!(event, Err(Error::Serialization { .. })));
    }

    #[tokio::test]
    async fn handle_error_event() {
        let data =
            b"data: {\"error\":{\"code\":503,\"message\":\"overloaded\",\"status\":\"UNAVAILABLE\"}}\n\n"
                .to_vec();
        let mut sse = Box::pin(process_events(bytes_of(vec![data])));
        let event = sse.next().await.unwrap();
        match event {
            Err(Error::Api {
                status_code,
                error_type,
                message,
            }) => {
                assert_eq!(status_code, 503);
                assert_eq!(error_type.as_deref(), Some("UNAVAILABLE"));
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from(chunk("partial"))),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from(chunk("never seen"))),
        ];
        let mut sse = Box::pin(process_events(stream::iter(parts)));
        assert!(sse.next().await.unwrap().is_ok());
        assert!(sse.next().await.unwrap().is_err());
        assert!(sse.next().await.is_none());
    }
}
