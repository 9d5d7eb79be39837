//! Byte-stream state machines shared by every streaming response.
//!
//! Both machines keep bounded state between increments and make no
//! assumption about where the network splits the stream.

pub mod sse;
pub mod think;

pub use sse::SseFrameReader;
pub use think::{ThinkPiece, ThinkTagStripper};
