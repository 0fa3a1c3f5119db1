//! Incremental decoder for the newline-delimited JSON body of `/api/generate`.
//!
//! Ollama emits one JSON object per line:
//! ```text
//! {"model":"llama3","response":"Hi","done":false}
//! {"model":"llama3","response":" there","done":false}
//! {"model":"llama3","response":"","done":true,"context":[1,2,3]}
//! ```
//!
//! Lines that fail to parse are logged and skipped.
//! A single bad line never ends the stream.

use serde::Deserialize;

use crate::{event::StreamEvent, model::ConversationContext};

/// Lines longer than this are dropped without being parsed.
pub const MAX_LINE_LEN: usize = 1 << 20;

/// One line of the generation stream as sent by the server.
/// Fields the client does not use (timings, token counts) are ignored.
#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    context: Option<ConversationContext>,
    #[serde(default)]
    error: Option<String>,
}

impl GenerateLine {
    fn into_events(self) -> Vec<StreamEvent> {
        if let Some(message) = self.error {
            return vec![StreamEvent::Error { message }];
        }

        if self.done {
            let token = self
                .response
                .filter(|text| !text.is_empty())
                .map(|text| StreamEvent::Token { text });
            token
                .into_iter()
                .chain(std::iter::once(StreamEvent::Done {
                    context: self.context,
                }))
                .collect()
        } else {
            self.response
                .map(|text| StreamEvent::Token { text })
                .into_iter()
                .collect()
        }
    }
}

/// Decode a single line into zero or more events.
/// Blank and malformed lines produce nothing.
pub fn decode_line(line: &[u8]) -> Vec<StreamEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Vec::new();
    }

    match serde_json::from_slice::<GenerateLine>(line) {
        Ok(parsed) => parsed.into_events(),
        Err(error) => {
            tracing::warn!(
                %error,
                line = %String::from_utf8_lossy(line),
                "skipping malformed stream line"
            );
            Vec::new()
        }
    }
}

/// Buffers body chunks and yields events for every complete line.
///
/// Chunks are kept as raw bytes until a newline arrives,
/// so multi-byte characters split across chunks survive.
/// A line that outgrows [`MAX_LINE_LEN`] is discarded up to its newline.
/// Once a terminal event has been produced the decoder is finished
/// and yields nothing more.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    /// Inside an oversized line; bytes are dropped until the next newline.
    skipping: bool,
    finished: bool,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body and collect the events of every line it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        // bytes already buffered hold no newline
        let mut scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(offset) = self.buffer[scan_from..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let line: Vec<u8> = self.buffer.drain(..=scan_from + offset).collect();
            scan_from = 0;
            if std::mem::take(&mut self.skipping) {
                continue;
            }
            if self.push_events(&mut events, decode_line(&line)) {
                self.buffer.clear();
                return events;
            }
        }

        if self.buffer.len() > MAX_LINE_LEN {
            if !self.skipping {
                tracing::warn!(
                    max = MAX_LINE_LEN,
                    "skipping stream line that exceeds the length limit"
                );
            }
            self.buffer.clear();
            self.skipping = true;
        }
        events
    }

    /// Decode whatever is left in the buffer once the body has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        if std::mem::take(&mut self.skipping) {
            return events;
        }
        self.push_events(&mut events, decode_line(&rest));
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true once a terminal event was pushed.
    fn push_events(&mut self, events: &mut Vec<StreamEvent>, decoded: Vec<StreamEvent>) -> bool {
        for event in decoded {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                self.finished = true;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token { text: text.into() }
    }

    #[test]
    fn decodes_tokens_and_done() {
        let mut decoder = NdjsonDecoder::new();
        let body = concat!(
            r#"{"response":"Hi","done":false}"#,
            "\n",
            r#"{"response":" there","done":false}"#,
            "\n",
            r#"{"response":"","done":true,"context":[1,2,3]}"#,
            "\n",
        );

        let events = decoder.decode(body.as_bytes());

        assert_eq!(
            events,
            vec![
                token("Hi"),
                token(" there"),
                StreamEvent::Done {
                    context: Some(vec![1, 2, 3].into())
                },
            ]
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn malformed_line_is_skipped() {
        let mut decoder = NdjsonDecoder::new();
        let body = concat!(
            r#"{"response":"a","done":false}"#,
            "\n",
            "{not json\n",
            r#"{"response":"b","done":false}"#,
            "\n",
        );

        let events = decoder.decode(body.as_bytes());

        assert_eq!(events, vec![token("a"), token("b")]);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn line_split_across_chunks() {
        let mut decoder = NdjsonDecoder::new();

        assert!(decoder.decode(br#"{"response":"hel"#).is_empty());
        let events = decoder.decode(b"lo\",\"done\":false}\r\n");

        assert_eq!(events, vec![token("hello")]);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut decoder = NdjsonDecoder::new();
        let line = "{\"response\":\"caf\u{e9}\",\"done\":false}\n".as_bytes();
        let split = line.iter().position(|byte| *byte == 0xc3).unwrap() + 1;

        assert!(decoder.decode(&line[..split]).is_empty());
        let events = decoder.decode(&line[split..]);

        assert_eq!(events, vec![token("caf\u{e9}")]);
    }

    #[test]
    fn done_without_response_still_terminates() {
        let events = decode_line(br#"{"done":true}"#);
        assert_eq!(events, vec![StreamEvent::Done { context: None }]);
    }

    #[test]
    fn final_line_text_is_kept() {
        let events = decode_line(br#"{"response":"!","done":true}"#);
        assert_eq!(
            events,
            vec![token("!"), StreamEvent::Done { context: None }]
        );
    }

    #[test]
    fn server_error_line_is_terminal() {
        let events = decode_line(br#"{"error":"model runner crashed"}"#);
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                message: "model runner crashed".into()
            }]
        );
    }

    #[test]
    fn nothing_after_terminal_event() {
        let mut decoder = NdjsonDecoder::new();
        let body = concat!(
            r#"{"done":true}"#,
            "\n",
            r#"{"response":"late","done":false}"#,
            "\n",
        );

        let events = decoder.decode(body.as_bytes());

        assert_eq!(events, vec![StreamEvent::Done { context: None }]);
        assert!(decoder.decode(b"{\"response\":\"later\"}\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn trailing_line_without_newline() {
        let mut decoder = NdjsonDecoder::new();

        assert!(decoder.decode(br#"{"done":true,"context":[7]}"#).is_empty());
        let events = decoder.finish();

        assert_eq!(
            events,
            vec![StreamEvent::Done {
                context: Some(vec![7].into())
            }]
        );
    }

    #[test]
    fn newline_in_a_later_chunk_completes_the_line() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.decode(br#"{"response":"a""#).is_empty());
        assert!(decoder.decode(br#","done":false}"#).is_empty());

        let events = decoder.decode(b"\n{\"response\":\"b\",\"done\":false}\n");

        assert_eq!(events, vec![token("a"), token("b")]);
    }

    #[test]
    fn oversized_line_is_skipped() {
        let mut decoder = NdjsonDecoder::new();
        let filler = vec![b'x'; MAX_LINE_LEN / 2 + 1];

        assert!(decoder.decode(&filler).is_empty());
        assert!(decoder.decode(&filler).is_empty());
        assert!(decoder.buffer.is_empty());
        assert!(decoder.decode(&filler).is_empty());

        let events = decoder.decode(b"xx\n{\"response\":\"ok\",\"done\":false}\n");
        assert_eq!(events, vec![token("ok")]);

        assert!(decoder.decode(&filler).is_empty());
        assert!(decoder.decode(&filler).is_empty());
        assert!(decoder.decode(&filler).is_empty());
        assert_eq!(decoder.finish(), Vec::new());
        assert!(!decoder.is_finished());
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert!(decode_line(b"   \r").is_empty());
        assert!(decode_line(br#"{"model":"llama3"}"#).is_empty());
    }
}
