use bytes::{Bytes, BytesMut};
use futures::{ready, Stream, StreamExt};
use std::{
    cmp,
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use crate::Error;

/// The body of one upload, as a stream of chunks that can be read once.
pub trait ChunkSource: Stream<Item = Result<Bytes, Error>> + Unpin {}

impl<T> ChunkSource for T where T: Stream<Item = Result<Bytes, Error>> + Unpin {}

/// Wraps a [`ChunkSource`] so its head can be inspected and then delivered
/// again as part of the full stream.
///
/// There are exactly two readers. [`peek`](ReplaySource::peek) pulls chunks
/// until `watermark` bytes are cached and hands out a copy of them; the
/// [`Replay`] stream returned by [`into_replay`](ReplaySource::into_replay)
/// then yields the cached chunks followed by the rest of the source, live.
/// The source itself is only ever pulled by whichever of the two currently
/// owns it, and each chunk is pulled once.
pub struct ReplaySource<S> {
    source: S,
    cache: VecDeque<Bytes>,
    cached: usize,
    watermark: usize,
    exhausted: bool,
}

impl<S: ChunkSource> ReplaySource<S> {
    pub fn new(source: S, watermark: usize) -> Self {
        Self {
            source,
            cache: VecDeque::new(),
            cached: 0,
            watermark,
            exhausted: false,
        }
    }

    /// Bytes held in the cache. Never more than the watermark plus the size
    /// of the last chunk pulled.
    pub fn cached_len(&self) -> usize {
        self.cached
    }

    /// Whether the source has already signalled its end.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fills the cache up to the watermark, or until the source ends, and
    /// returns a copy of the first `min(watermark, cached)` bytes.
    ///
    /// Calling it again does not pull any further.
    pub async fn peek(&mut self) -> Result<Bytes, Error> {
        while self.cached < self.watermark && !self.exhausted {
            match self.source.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }

                    log::trace!("Caching chunk of {} bytes", chunk.len());
                    self.cached += chunk.len();
                    self.cache.push_back(chunk);
                }
                Some(Err(e)) => return Err(e),
                None => self.exhausted = true,
            }
        }

        let take = cmp::min(self.watermark, self.cached);
        let mut prefix = BytesMut::with_capacity(take);

        for chunk in &self.cache {
            let n = cmp::min(chunk.len(), take - prefix.len());
            if n == 0 {
                break;
            }
            prefix.extend_from_slice(&chunk[..n]);
        }

        Ok(prefix.freeze())
    }

    /// Drops the cached chunks and the source without forwarding anything.
    /// Returns the number of cached bytes that were discarded.
    pub fn release(mut self) -> usize {
        let released = self.cached;
        self.cache.clear();
        self.cached = 0;
        log::debug!("Released {} cached bytes", released);
        released
    }

    pub fn into_replay(self) -> Replay<S> {
        let ReplaySource {
            source,
            cache,
            exhausted,
            ..
        } = self;

        Replay {
            cache,
            // A finished source must not be polled again.
            source: if exhausted { None } else { Some(source) },
            forwarded: 0,
        }
    }
}

/// The full content of a [`ReplaySource`]: cached chunks first, then the
/// remaining chunks of the source as they arrive.
///
/// The source is only polled when the replay itself is polled, so a slow
/// consumer slows down the upload instead of filling memory. A source error
/// is yielded once and ends the stream.
pub struct Replay<S> {
    cache: VecDeque<Bytes>,
    source: Option<S>,
    forwarded: u64,
}

impl<S> Replay<S> {
    /// Bytes handed out so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}

impl<S: ChunkSource> Stream for Replay<S> {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if let Some(chunk) = this.cache.pop_front() {
            this.forwarded += chunk.len() as u64;
            return Poll::Ready(Some(Ok(chunk)));
        }

        loop {
            let source = match this.source.as_mut() {
                Some(source) => source,
                None => return Poll::Ready(None),
            };

            match ready!(Pin::new(source).poll_next(cx)) {
                Some(Ok(chunk)) if chunk.is_empty() => continue,

                Some(Ok(chunk)) => {
                    this.forwarded += chunk.len() as u64;
                    return Poll::Ready(Some(Ok(chunk)));
                }

                Some(Err(e)) => {
                    log::warn!("Upload failed after {} bytes: {}", this.forwarded, e);
                    this.source = None;
                    return Poll::Ready(Some(Err(e)));
                }

                None => {
                    log::debug!("Replay done, {} bytes forwarded", this.forwarded);
                    this.source = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<S> Drop for Replay<S> {
    fn drop(&mut self) {
        if self.source.is_some() || !self.cache.is_empty() {
            let cached: usize = self.cache.iter().map(Bytes::len).sum();
            log::debug!(
                "Replay dropped after {} bytes, releasing {} cached bytes",
                self.forwarded,
                cached
            );
        }
    }
}
