//! Server-Sent Events frame reader.
//!
//! Reads newline-delimited lines out of arbitrarily fragmented byte chunks
//! and yields the trimmed payload of every `data:` line. A `[DONE]` payload
//! ends the stream: nothing pushed afterwards is ever read. Comment lines
//! (`:`) and other fields (`event:`, `id:`, `retry:`) are ignored.
//!
//! ```text
//! event: message
//! data: {"key": "value"}
//!
//! data: [DONE]
//! ```

const DATA_FIELD: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

enum Line {
    Data(String),
    Done,
}

/// Incremental SSE reader
#[derive(Debug, Default)]
pub struct SseFrameReader {
    buffer: Vec<u8>,
    done: bool,
}

impl SseFrameReader {
    /// Create a new reader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed bytes, returning the payloads of every line completed by them.
    ///
    /// Bytes are buffered until a newline arrives, so multi-byte characters
    /// split across chunks decode correctly.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = parse_line(&self.buffer[start..end]);
            start = end + 1;

            match line {
                Some(Line::Data(payload)) => frames.push(payload),
                Some(Line::Done) => {
                    self.done = true;
                    self.buffer.clear();
                    return frames;
                }
                None => {}
            }
        }

        self.buffer.drain(..start);
        frames
    }

    /// Drain a final line that was never newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        let rest = std::mem::take(&mut self.buffer);
        match parse_line(&rest)? {
            Line::Data(payload) => Some(payload),
            Line::Done => {
                self.done = true;
                None
            }
        }
    }
}

fn parse_line(raw: &[u8]) -> Option<Line> {
    let text = String::from_utf8_lossy(raw);
    let payload = text.trim_end_matches('\r').strip_prefix(DATA_FIELD)?.trim();

    if payload.is_empty() {
        None
    } else if payload == DONE_SENTINEL {
        Some(Line::Done)
    } else {
        Some(Line::Data(payload.to_string()))
    }
}
