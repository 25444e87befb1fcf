//! Incremental text delivery for streamed replies

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Capacity used by every producer feeding a `TokenStream`.
pub const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Receiving half of a streamed reply. Dropping it tells the producer to stop.
pub struct TokenStream {
    receiver: mpsc::Receiver<String>,
}

impl TokenStream {
    pub fn new(receiver: mpsc::Receiver<String>) -> Self {
        Self { receiver }
    }

    /// A stream that yields `text` once and then ends.
    pub fn single(text: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        // Capacity 1 and a fresh receiver: this cannot fail.
        let _ = sender.try_send(text.into());
        Self { receiver }
    }

    /// Get next chunk
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Collect all chunks into a string
    pub async fn collect(mut self) -> String {
        let mut result = String::new();
        while let Some(chunk) = self.next().await {
            result.push_str(&chunk);
        }
        result
    }
}

impl Stream for TokenStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Split a buffered SSE body into complete `data:` payloads, leaving any partial line in place.
///
/// Bytes are only decoded once a whole line is buffered, so a multi-byte character split across
/// network chunks survives intact.
pub(crate) fn drain_sse_data(buffer: &mut Vec<u8>, chunk: &bytes::Bytes) -> Vec<String> {
    buffer.extend_from_slice(chunk);

    let mut payloads = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = String::from_utf8_lossy(&raw);

        if let Some(data) = line.trim().strip_prefix("data:") {
            payloads.push(data.trim_start().to_string());
        }
    }
    payloads
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_single_yields_once() {
        let mut stream = TokenStream::single("hello");
        assert_eq!(stream.next().await.as_deref(), Some("hello"));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_stream_trait_collects_in_order() {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            for part in ["a", "b", "c"] {
                tx.send(part.to_string()).await.unwrap();
            }
        });
        let parts: Vec<String> = StreamExt::collect(TokenStream::new(rx)).await;
        assert_eq!(parts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drain_keeps_partial_line() {
        let mut buffer = Vec::new();
        let first = drain_sse_data(
            &mut buffer,
            &bytes::Bytes::from_static(b"event: x\ndata: {\"a\":1}\ndata: {\"b\""),
        );
        assert_eq!(first, vec!["{\"a\":1}"]);
        assert_eq!(buffer, b"data: {\"b\"");

        let second = drain_sse_data(&mut buffer, &bytes::Bytes::from_static(b":2}\n\n"));
        assert_eq!(second, vec!["{\"b\":2}"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_keeps_multibyte_char_split_across_chunks() {
        let body = "data: {\"t\":\"perché 🚀\"}\n".as_bytes();
        let split = body.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buffer = Vec::new();
        let first = drain_sse_data(&mut buffer, &bytes::Bytes::copy_from_slice(&body[..split]));
        assert!(first.is_empty());
        let second = drain_sse_data(&mut buffer, &bytes::Bytes::copy_from_slice(&body[split..]));
        assert_eq!(second, vec!["{\"t\":\"perché 🚀\"}"]);
        assert!(buffer.is_empty());
    }
}
