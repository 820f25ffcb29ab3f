//! Newline-delimited JSON decoding for streamed generate responses.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until
//! a full line is available. Lines that are not a generate object are skipped.

use super::types::GenerateChunk;
use crate::ChunkStream;
use copilot_core::ModelError;
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

struct LineDecoder<S> {
    inner: Pin<Box<S>>,
    transport: &'static str,
    buf: Vec<u8>,
    pending: VecDeque<Result<String, ModelError>>,
    finished: bool,
}

impl<S> LineDecoder<S> {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.handle_line(&line[..line.len() - 1]);
        }
    }

    fn flush_tail(&mut self) {
        let tail = std::mem::take(&mut self.buf);
        self.handle_line(&tail);
    }

    fn handle_line(&mut self, line: &[u8]) {
        if self.finished || line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match serde_json::from_slice::<GenerateChunk>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    self.pending
                        .push_back(Err(ModelError::unavailable(self.transport, error)));
                    self.finished = true;
                    return;
                }
                if !chunk.response.is_empty() {
                    self.pending.push_back(Ok(chunk.response));
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(e) => {
                tracing::debug!(
                    transport = self.transport,
                    error = %e,
                    line_len = line.len(),
                    "Skipping undecodable stream line"
                );
            }
        }
    }
}

/// Turn a byte stream of NDJSON generate objects into text chunks.
///
/// The returned stream ends after the object with `done: true`, after an
/// object carrying `error` (yielded as `ModelError::Unavailable`), or when the
/// byte stream ends.
pub fn decode_chunks<S, B, E>(bytes: S, transport: &'static str) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let decoder = LineDecoder {
        inner: Box::pin(bytes),
        transport,
        buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(decoder, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                    st.finished = true;
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buf.extend_from_slice(bytes.as_ref());
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    let err =
                        ModelError::unavailable(st.transport, format!("stream read failed: {}", e));
                    st.pending.push_back(Err(err));
                }
                None => {
                    st.flush_tail();
                    st.finished = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parts: Vec<&'static str>) -> ChunkStream {
        let items: Vec<Result<Vec<u8>, String>> =
            parts.into_iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        decode_chunks(stream::iter(items), "http")
    }

    async fn drain(chunks: ChunkStream) -> Vec<Result<String, ModelError>> {
        chunks.collect().await
    }

    #[tokio::test]
    async fn test_lines_split_across_network_chunks() {
        let out = drain(feed(vec![
            "{\"response\":\"Hel",
            "lo\",\"done\":false}\n{\"resp",
            "onse\":\" world\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        ]))
        .await;
        assert_eq!(out, vec![Ok("Hello".to_string()), Ok(" world".to_string())]);
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let out = drain(feed(vec![
            "{\"response\":\"a\"}\nnot json at all\n{\"response\":\"b\",\"done\":true}\n",
        ]))
        .await;
        assert_eq!(out, vec![Ok("a".to_string()), Ok("b".to_string())]);
    }

    #[tokio::test]
    async fn test_error_object_is_terminal() {
        let out = drain(feed(vec![
            "{\"response\":\"a\"}\n{\"error\":\"model not found\"}\n{\"response\":\"b\"}\n",
        ]))
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("a".to_string()));
        assert!(matches!(
            &out[1],
            Err(ModelError::Unavailable { reason, .. }) if reason == "model not found"
        ));
    }

    #[tokio::test]
    async fn test_nothing_after_done() {
        let out = drain(feed(vec![
            "{\"response\":\"a\",\"done\":true}\n{\"response\":\"ignored\"}\n",
        ]))
        .await;
        assert_eq!(out, vec![Ok("a".to_string())]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_decoded() {
        let out = drain(feed(vec!["{\"response\":\"tail\"}"])).await;
        assert_eq!(out, vec![Ok("tail".to_string())]);
    }

    #[tokio::test]
    async fn test_read_error_is_terminal() {
        let items: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"{\"response\":\"a\"}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"{\"response\":\"b\"}\n".to_vec()),
        ];
        let out = drain(decode_chunks(stream::iter(items), "http")).await;
        assert_eq!(out.len(), 2);
        assert!(out[1].is_err());
    }
}
