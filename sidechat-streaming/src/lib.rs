//! # sidechat-streaming
//!
//! Streaming infrastructure for sidechat: the wire decoder that turns raw
//! byte chunks into provider-native JSON frames, the vendor-neutral stream
//! event model, and the accumulator that reduces an event sequence into a
//! final reply.
//!
//! ## Core concepts
//!
//! - [`WireDecoder`]: chunk-boundary-safe SSE / NDJSON line decoding
//! - [`StreamEvent`]: normalized content / thinking / raw / done events
//! - [`StreamAccumulator`]: adopts adapter-supplied running totals and
//!   freezes the final [`StreamedReply`], preserving partial output on error
//!
//! ## Example
//!
//! ```rust
//! use sidechat_streaming::{RawFrame, WireDecoder};
//!
//! let mut decoder = WireDecoder::sse();
//! let frames = decoder.feed(b"data: {\"hello\":true}\n\n");
//! assert!(matches!(frames[0], RawFrame::Event(_)));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod accumulator;
pub mod events;
pub mod wire;

pub use accumulator::{StreamAccumulator, StreamedReply};
pub use events::StreamEvent;
pub use wire::{Framing, RawFrame, WireDecoder};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{Framing, RawFrame, StreamAccumulator, StreamEvent, StreamedReply, WireDecoder};
}
