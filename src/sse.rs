//! Server-Sent Events framing for provider streams.
//!
//! All four provider wire protocols stream over SSE. The framing rules:
//!
//! - lines beginning with `:` are comments and are ignored
//! - `event:` sets the event type for the next dispatch
//! - `data:` lines accumulate; multi-line data is joined with `\n`
//! - a blank line dispatches the accumulated `(event_type, data)` pair
//! - a single leading space after the field `:` is stripped
//! - `data: [DONE]` terminates the stream without being yielded
//!
//! [`SseParser`] is the push-based core: feed it raw chunks (which may
//! split lines, or even UTF-8 sequences, at arbitrary byte positions) and
//! collect dispatched events. [`sse_event_stream`] wraps an HTTP response
//! body into a stream of parsed events.

use futures::stream::{Stream, StreamExt};

use crate::error::{Error, Result};

/// One dispatched SSE event: the `event:` field (if any) and the joined
/// `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE parser with partial-line buffering.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event_type: Option<String>,
    data_lines: Vec<String>,
    done: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen. Once done, further
    /// input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a raw chunk of the response body; returns any events that
    /// became complete. Incomplete trailing lines stay buffered.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }

        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
            if self.done {
                break;
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        // Blank line dispatches the accumulated event.
        if line.is_empty() {
            if self.data_lines.is_empty() {
                self.event_type = None;
                return None;
            }
            let data = self.data_lines.join("\n");
            self.data_lines.clear();
            let event = self.event_type.take();
            if data == "[DONE]" {
                self.done = true;
                return None;
            }
            return Some(SseEvent { event, data });
        }

        // Comment line.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // `retry`, `id`, and unknown fields are ignored.
            _ => {}
        }

        None
    }
}

/// Parse an HTTP response body as an SSE stream.
///
/// Transport errors surface as stream items; the stream ends at the
/// `[DONE]` sentinel or when the body is exhausted.
pub fn sse_event_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<SseEvent>> + Send {
    let mut parser = SseParser::new();

    response
        .bytes_stream()
        .map(move |chunk| -> Vec<Result<SseEvent>> {
            match chunk {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    parser.feed(&text).into_iter().map(Ok).collect()
                }
                Err(error) => vec![Err(Error::Http(error))],
            }
        })
        .flat_map(futures::stream::iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(lines: &[&str]) -> Vec<SseEvent> {
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for line in lines {
            events.extend(parser.feed(line));
        }
        events
    }

    #[test]
    fn test_simple_data_event() {
        let events = collect(&["data: foo\n", "\n"]);
        assert_eq!(
            events,
            vec![SseEvent {
                event: None,
                data: "foo".to_string()
            }]
        );
    }

    #[test]
    fn test_typed_event() {
        let events = collect(&["event: message\n", "data: hello\n", "\n"]);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multi_line_data_joined_with_newline() {
        let events = collect(&["data: line one\n", "data: line two\n", "\n"]);
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn test_comments_ignored() {
        let events = collect(&[": heartbeat\n", "data: actual\n", "\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "actual");
    }

    #[test]
    fn test_done_sentinel_terminates() {
        let events = collect(&[
            "data: hello\n",
            "\n",
            "data: [DONE]\n",
            "\n",
            "data: after\n",
            "\n",
        ]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_partial_lines_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed("da").is_empty());
        assert!(parser.feed("ta: spl").is_empty());
        assert!(parser.feed("it\n").is_empty());
        let events = parser.feed("\n");
        assert_eq!(events[0].data, "split");
    }

    #[test]
    fn test_single_leading_space_stripped_once() {
        let events = collect(&["data:  two spaces\n", "\n"]);
        assert_eq!(events[0].data, " two spaces");
    }

    #[test]
    fn test_crlf_line_endings() {
        let events = collect(&["data: crlf\r\n", "\r\n"]);
        assert_eq!(events[0].data, "crlf");
    }

    #[test]
    fn test_event_type_resets_between_dispatches() {
        let events = collect(&[
            "event: start\n",
            "data: first\n",
            "\n",
            "data: second\n",
            "\n",
        ]);
        assert_eq!(events[0].event.as_deref(), Some("start"));
        assert_eq!(events[1].event, None);
    }
}
