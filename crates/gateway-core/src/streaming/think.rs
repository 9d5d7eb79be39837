//! `<think>...</think>` span stripper.
//!
//! Some models interleave their reasoning with the answer inside think tags.
//! The stripper removes those spans from the text channel and, in capture
//! mode, hands their content back as separate thinking pieces. A tag may be
//! split across any number of increments, down to one character each; the
//! longest tail that could still start a tag is held back until the next
//! increment decides it.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Output piece, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThinkPiece {
    /// Visible answer text
    Text(String),
    /// Content of a think span (capture mode only)
    Thinking(String),
}

/// Per-stream think-tag filter
#[derive(Debug, Default)]
pub struct ThinkTagStripper {
    inside_think_block: bool,
    pending: String,
    capture: bool,
}

impl ThinkTagStripper {
    /// Stripper that discards think content
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stripper that re-emits think content as [`ThinkPiece::Thinking`]
    #[must_use]
    pub fn capturing() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }

    /// Whether the last increment ended inside a think span
    #[must_use]
    pub fn inside_think_block(&self) -> bool {
        self.inside_think_block
    }

    /// Process one text increment
    pub fn process(&mut self, increment: &str) -> Vec<ThinkPiece> {
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.push_str(increment);

        let mut pieces = Vec::new();
        let mut rest = buffer.as_str();

        loop {
            if self.inside_think_block {
                if let Some(idx) = rest.find(CLOSE_TAG) {
                    if self.capture {
                        push_piece(&mut pieces, &rest[..idx], ThinkPiece::Thinking);
                    }
                    rest = &rest[idx + CLOSE_TAG.len()..];
                    self.inside_think_block = false;
                } else {
                    let (consumed, held) = rest.split_at(rest.len() - partial_tag_len(rest, CLOSE_TAG));
                    if self.capture {
                        push_piece(&mut pieces, consumed, ThinkPiece::Thinking);
                    }
                    self.pending = held.to_string();
                    break;
                }
            } else if let Some(idx) = rest.find(OPEN_TAG) {
                push_piece(&mut pieces, &rest[..idx], ThinkPiece::Text);
                rest = &rest[idx + OPEN_TAG.len()..];
                self.inside_think_block = true;
            } else {
                let (visible, held) = rest.split_at(rest.len() - partial_tag_len(rest, OPEN_TAG));
                push_piece(&mut pieces, visible, ThinkPiece::Text);
                self.pending = held.to_string();
                break;
            }
        }

        pieces
    }

    /// Text-only view of [`process`](Self::process); `None` when nothing is visible yet
    pub fn process_text(&mut self, increment: &str) -> Option<String> {
        let text: String = self
            .process(increment)
            .into_iter()
            .filter_map(|piece| match piece {
                ThinkPiece::Text(text) => Some(text),
                ThinkPiece::Thinking(_) => None,
            })
            .collect();
        (!text.is_empty()).then_some(text)
    }

    /// End of stream: release held-back text, unless the stream ended mid-span
    pub fn flush(&mut self) -> Option<String> {
        let pending = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.inside_think_block) {
            return None;
        }
        (!pending.is_empty()).then_some(pending)
    }
}

/// Length of the longest proper prefix of `tag` that `text` ends with
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&len| text.ends_with(&tag[..len]))
        .unwrap_or(0)
}

fn push_piece(pieces: &mut Vec<ThinkPiece>, text: &str, make: fn(String) -> ThinkPiece) {
    if text.is_empty() {
        return;
    }
    match (pieces.last_mut(), make(String::new())) {
        (Some(ThinkPiece::Text(last)), ThinkPiece::Text(_))
        | (Some(ThinkPiece::Thinking(last)), ThinkPiece::Thinking(_)) => last.push_str(text),
        _ => pieces.push(make(text.to_string())),
    }
}
