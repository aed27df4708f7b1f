//! Shared HTTP client, stream framing, and auth utilities.
//!
//! The payload parser hides transport framing from adapters: it turns a raw
//! byte stream into discrete textual payloads, in either SSE framing or the
//! bracket/comma pseudo-array framing Google uses for streamed responses.

use std::sync::OnceLock;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

use crate::error::ColloquyError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key + version pin).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Map a non-success HTTP status to a request-level error.
pub fn status_to_error(status: u16, body: &str) -> ColloquyError {
    match status {
        401 | 403 => ColloquyError::Authentication(body.to_string()),
        429 => ColloquyError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ColloquyError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Transport framing of a provider's streaming response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// Server-Sent Events `data:` lines.
    Sse,
    /// Bracket/comma-delimited pseudo-array, one JSON object per line.
    JsonArray,
}

/// Parse an SSE line, returning the payload of a `data:` line.
///
/// Comment lines, blank lines, non-data fields, and the `[DONE]` sentinel all
/// return `None`.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Strip pseudo-array framing: one leading `[` or `,` and one trailing `]`.
pub fn parse_array_chunk(line: &str) -> Option<&str> {
    let chunk = line.trim();
    let chunk = chunk
        .strip_prefix('[')
        .or_else(|| chunk.strip_prefix(','))
        .unwrap_or(chunk);
    let chunk = chunk.strip_suffix(']').unwrap_or(chunk).trim();
    if chunk.is_empty() {
        None
    } else {
        Some(chunk)
    }
}

fn frame_line(line: &str, framing: StreamFraming) -> Option<&str> {
    match framing {
        StreamFraming::Sse => parse_sse_data(line),
        StreamFraming::JsonArray => parse_array_chunk(line),
    }
}

/// Decode a byte stream into discrete textual payloads.
///
/// Lines split across network reads are buffered until complete; a leftover
/// unterminated line at stream end is flushed as a final payload. The
/// cancellation token is observed between reads: once cancelled, the stream
/// stops yielding and the transport is dropped without an error.
pub fn payload_stream<S, B, E>(
    bytes: S,
    framing: StreamFraming,
    cancel: CancellationToken,
) -> BoxStream<'static, Result<String, ColloquyError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<ColloquyError> + Send,
{
    let stream = async_stream::stream! {
        let mut bytes = std::pin::pin!(bytes);
        let mut buffer = String::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                chunk = bytes.next() => match chunk {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        yield Err(e.into());
                        break;
                    }
                    None => break,
                },
            };
            buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();
                if let Some(payload) = frame_line(&line, framing) {
                    yield Ok(payload.to_string());
                }
            }
        }
        if !cancel.is_cancelled() {
            // flush a final unterminated line
            let line = buffer.trim().to_string();
            if !line.is_empty() {
                if let Some(payload) = frame_line(&line, framing) {
                    yield Ok(payload.to_string());
                }
            }
        }
    };
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<&'static [u8], ColloquyError>> + Send {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes())))
    }

    async fn collect_payloads(
        chunks: Vec<&'static str>,
        framing: StreamFraming,
    ) -> Vec<String> {
        payload_stream(byte_stream(chunks), framing, CancellationToken::new())
            .map(|item| item.unwrap())
            .collect()
            .await
    }

    #[test]
    fn sse_line_parsing() {
        assert_eq!(parse_sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data:{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data: [DONE]"), None);
        assert_eq!(parse_sse_data(": keep-alive"), None);
        assert_eq!(parse_sse_data("event: ping"), None);
        assert_eq!(parse_sse_data("data:"), None);
    }

    #[test]
    fn array_chunk_parsing() {
        assert_eq!(parse_array_chunk("[{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_array_chunk(",{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_array_chunk("{\"a\":1}]"), Some("{\"a\":1}"));
        assert_eq!(parse_array_chunk("]"), None);
        assert_eq!(parse_array_chunk(""), None);
    }

    #[tokio::test]
    async fn sse_payloads_across_whole_lines() {
        let payloads = collect_payloads(
            vec!["data: one\n\ndata: two\n", "data: [DONE]\n"],
            StreamFraming::Sse,
        )
        .await;
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn lines_split_across_reads_are_buffered() {
        let payloads = collect_payloads(
            vec!["data: {\"k\":", "\"v\"}\nda", "ta: second\n"],
            StreamFraming::Sse,
        )
        .await;
        assert_eq!(payloads, vec!["{\"k\":\"v\"}", "second"]);
    }

    #[tokio::test]
    async fn crlf_lines_are_trimmed() {
        let payloads =
            collect_payloads(vec!["data: one\r\ndata: two\r\n"], StreamFraming::Sse).await;
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn unterminated_final_line_is_flushed() {
        let payloads = collect_payloads(vec!["data: tail"], StreamFraming::Sse).await;
        assert_eq!(payloads, vec!["tail"]);
    }

    #[tokio::test]
    async fn pseudo_array_framing_strips_brackets_and_commas() {
        let payloads = collect_payloads(
            vec!["[{\"n\":1}\n", ",{\"n\":2}\n", "]\n"],
            StreamFraming::JsonArray,
        )
        .await;
        assert_eq!(payloads, vec!["{\"n\":1}", "{\"n\":2}"]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_yielding() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let payloads: Vec<_> = payload_stream(
            byte_stream(vec!["data: one\ndata: two\n"]),
            StreamFraming::Sse,
            cancel,
        )
        .collect()
        .await;
        assert!(payloads.is_empty());
    }
}
