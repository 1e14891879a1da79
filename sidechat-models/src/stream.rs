//! Driving a decoded byte stream through a vendor event mapper.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use sidechat_core::NormalizedError;
use sidechat_streaming::{RawFrame, StreamEvent, WireDecoder};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::http::normalize_transport;

/// Translates provider-native frames into normalized stream events.
///
/// Mappers own the running accumulation state, so `accumulated` in the
/// events they emit is authoritative. A mapper must emit at most one
/// [`StreamEvent::Done`]; [`EventMapper::finish`] is called at end of input
/// and must synthesize the terminal event if none was emitted.
pub trait EventMapper: Send {
    /// Map one decoded frame into zero or more events.
    ///
    /// Returning `Err` ends the stream abnormally.
    fn map_frame(&mut self, frame: RawFrame) -> Result<Vec<StreamEvent>, NormalizedError>;

    /// Flush at end of input.
    fn finish(&mut self) -> Vec<StreamEvent>;
}

pin_project! {
    /// Adapter from a raw byte stream to normalized events.
    ///
    /// Enforces the terminal invariant: exactly one `Done` or `Err` is
    /// yielded, and nothing after it, even if the vendor keeps sending.
    pub struct MappedStream<S, M> {
        #[pin]
        inner: S,
        decoder: WireDecoder,
        mapper: M,
        queue: VecDeque<Result<StreamEvent, NormalizedError>>,
        provider: &'static str,
        terminated: bool,
        inner_done: bool,
    }
}

impl<S, M> MappedStream<S, M>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
    M: EventMapper,
{
    /// Create a mapped stream.
    pub fn new(inner: S, decoder: WireDecoder, mapper: M, provider: &'static str) -> Self {
        Self {
            inner,
            decoder,
            mapper,
            queue: VecDeque::new(),
            provider,
            terminated: false,
            inner_done: false,
        }
    }
}

impl<S, M> Stream for MappedStream<S, M>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
    M: EventMapper,
{
    type Item = Result<StreamEvent, NormalizedError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.terminated {
                return Poll::Ready(None);
            }

            if let Some(item) = this.queue.pop_front() {
                let terminal = match &item {
                    Ok(event) => event.is_terminal(),
                    Err(_) => true,
                };
                if terminal {
                    *this.terminated = true;
                }
                return Poll::Ready(Some(item));
            }

            if *this.inner_done {
                // Mapper guarantees a synthesized terminal, so an empty
                // queue here means it was already delivered.
                *this.terminated = true;
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    for frame in this.decoder.feed(&bytes) {
                        match this.mapper.map_frame(frame) {
                            Ok(events) => this.queue.extend(events.into_iter().map(Ok)),
                            Err(error) => {
                                this.queue.push_back(Err(error));
                                break;
                            }
                        }
                    }
                }
                Poll::Ready(Some(Err(error))) => {
                    this.queue
                        .push_back(Err(normalize_transport(&error, this.provider, None)));
                }
                Poll::Ready(None) => {
                    *this.inner_done = true;
                    for frame in this.decoder.finish() {
                        match this.mapper.map_frame(frame) {
                            Ok(events) => this.queue.extend(events.into_iter().map(Ok)),
                            Err(error) => {
                                this.queue.push_back(Err(error));
                                break;
                            }
                        }
                    }
                    if !this.queue.iter().any(|item| {
                        matches!(item, Err(_)) || matches!(item, Ok(event) if event.is_terminal())
                    }) {
                        this.queue
                            .extend(this.mapper.finish().into_iter().map(Ok));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
