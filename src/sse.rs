//! Server-Sent Events (SSE) line framing for streaming completions.
//!
//! The endpoint streams newline-delimited frames of the form `data: <json>`,
//! terminated by `data: [DONE]`.  This module turns a raw byte stream into a
//! stream of classified [`Frame`]s.  Deciding what to do with each frame is
//! left to the client.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};
use crate::types::StreamChunk;

/// Prefix carried by every frame that holds a payload.
pub const DATA_PREFIX: &str = "data:";

/// Payload that marks the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A single classified line of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A payload carrying a non-empty content delta.
    Delta(String),

    /// The end-of-stream sentinel.
    Done,

    /// A blank line, a comment, a non-data field or a payload without content.
    Ignored,

    /// A data payload that failed to parse; carries the raw payload.
    Malformed(String),
}

/// Classifies one line of the event stream.
pub fn parse_frame(line: &str) -> Frame {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Frame::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => match chunk.into_content() {
            Some(content) => Frame::Delta(content),
            None => Frame::Ignored,
        },
        Err(_) => Frame::Malformed(payload.to_string()),
    }
}

/// Process a stream of bytes into a stream of frames.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.  A line that is
/// not valid UTF-8 is yielded as [`Frame::Malformed`].  A final line without a
/// trailing newline is still delivered when the byte stream ends.  The first
/// transport error is yielded and ends the frame stream.
pub fn frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<Frame>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (byte_stream, buffer, false),
        move |(mut stream, mut buffer, mut finished)| async move {
            loop {
                // First check if we have a complete line in the buffer
                if let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    return Some((Ok(decode_line(&line)), (stream, buffer, finished)));
                }

                if finished {
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buffer);
                    return Some((Ok(decode_line(&line)), (stream, buffer, finished)));
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((
                            Err(Error::streaming(
                                format!("Error in HTTP stream: {e}"),
                                Some(Box::new(e)),
                            )),
                            (stream, buffer, true),
                        ));
                    }
                    None => finished = true,
                }
            }
        },
    )
}

fn decode_line(line: &[u8]) -> Frame {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    match std::str::from_utf8(line) {
        Ok(text) => parse_frame(text),
        Err(e) => {
            tracing::trace!(error = %e, "invalid UTF-8 in stream line");
            Frame::Malformed(String::from_utf8_lossy(line).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn chunks(
        parts: &[&'static [u8]],
    ) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin + use<> {
        let parts: Vec<&'static [u8]> = parts.to_vec();
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    async fn collect(parts: &[&'static [u8]]) -> Vec<Frame> {
        frames(chunks(parts))
            .map(|frame| frame.unwrap())
            .collect()
            .await
    }

    #[test]
    fn parse_content_delta() {
        assert_eq!(
            parse_frame(r#"data: {"choices":[{"delta":{"content":"A"}}]}"#),
            Frame::Delta("A".to_string())
        );
    }

    #[test]
    fn parse_sentinel() {
        assert_eq!(parse_frame("data: [DONE]"), Frame::Done);
        assert_eq!(parse_frame("data: [DONE]\r"), Frame::Done);
        assert_eq!(parse_frame("data:[DONE]"), Frame::Done);
    }

    #[test]
    fn parse_ignored_lines() {
        assert_eq!(parse_frame(""), Frame::Ignored);
        assert_eq!(parse_frame(": OPENROUTER PROCESSING"), Frame::Ignored);
        assert_eq!(parse_frame("event: message"), Frame::Ignored);
        assert_eq!(
            parse_frame(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            Frame::Ignored
        );
    }

    #[test]
    fn parse_malformed_payload() {
        assert_eq!(
            parse_frame("data: {not json"),
            Frame::Malformed("{not json".to_string())
        );
    }

    #[tokio::test]
    async fn frames_split_across_chunks() {
        let frames = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"con",
            b"tent\":\"A\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\r\n",
            b"\ndata: [DONE]\n\n",
        ])
        .await;
        let interesting: Vec<Frame> = frames
            .into_iter()
            .filter(|f| *f != Frame::Ignored)
            .collect();
        assert_eq!(
            interesting,
            vec![
                Frame::Delta("A".to_string()),
                Frame::Delta("B".to_string()),
                Frame::Done
            ]
        );
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks() {
        // "é" is 0xC3 0xA9; split it between two network chunks.
        let frames = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3",
            b"\xA9\"}}]}\n",
        ])
        .await;
        assert_eq!(frames, vec![Frame::Delta("café".to_string())]);
    }

    #[test]
    fn trailing_line_without_newline_is_delivered() {
        let frames = tokio_test::block_on(collect(&[b"data: [DONE]"]));
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped_as_malformed() {
        let frames = collect(&[
            b"data: \xFF\xFE\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n",
            b"data: [DONE]\n",
        ])
        .await;
        assert_eq!(frames.len(), 3);
        assert!(matches!(&frames[0], Frame::Malformed(raw) if raw.starts_with("data: ")));
        assert_eq!(frames[1], Frame::Delta("B".to_string()));
        assert_eq!(frames[2], Frame::Done);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];
        let mut frames = Box::pin(frames(stream::iter(parts)));
        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            Frame::Delta("A".to_string())
        );
        assert!(matches!(
            frames.next().await,
            Some(Err(Error::Streaming { .. }))
        ));
        assert!(frames.next().await.is_none());
    }
}
