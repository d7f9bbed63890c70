use bytes::Bytes;
use futures::{future, ready, Stream};
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use crate::{
    parser::{BoundaryParser, ParseResult},
    Error, HeaderMap, PartHeaders,
};

/// Default initial buffer capacity
pub const DEFAULT_BUFFER_CAP: usize = 8 * 1024;

enum Event {
    Headers(PartHeaders),
    Body(Bytes),
    PartEnd,
    Done,
}

/// A `multipart/form-data` request body, read lazily from a stream of chunks.
///
/// Nothing is pulled from the inner stream until a part is asked for, and
/// part bodies are never collected: they are handed out piece by piece as
/// the parser releases them.
pub struct Multipart<S> {
    inner: S,
    parser: BoundaryParser,
    inner_done: bool,
}

impl<S, E> Multipart<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    pub fn with_capacity<B: AsRef<str>>(inner: S, boundary: B, buf_cap: usize) -> Self {
        Self {
            inner,
            parser: BoundaryParser::with_capacity(boundary, buf_cap),
            inner_done: false,
        }
    }

    /// Reads the boundary from the request headers.
    pub fn from_headers<H>(headers: &H, inner: S) -> Result<Self, Error>
    where
        H: HeaderMap + ?Sized,
    {
        let boundary = headers.multipart_boundary()?;
        Ok(Self::with_capacity(inner, boundary, DEFAULT_BUFFER_CAP))
    }

    /// Skips every part in front of the one named `name` and returns that
    /// part's body as a stream. Parts after it are never read.
    pub async fn into_part(mut self, name: &str) -> Result<FilePart<S>, Error> {
        loop {
            let event = future::poll_fn(|cx| self.poll_event(cx)).await?;

            match event {
                Event::Headers(headers) => {
                    if headers.name() == Some(name) {
                        log::debug!("Found part {:?}", name);
                        return Ok(FilePart {
                            multipart: self,
                            headers,
                            finished: false,
                        });
                    }

                    log::debug!("Skipping part {:?}", headers.name());
                }

                // Body of a skipped part.
                Event::Body(_) | Event::PartEnd => {}

                Event::Done => return Err(Error::PartMissing(name.to_string())),
            }
        }
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Result<Event, Error>> {
        loop {
            match self.parser.parse() {
                ParseResult::NotReady => {}
                ParseResult::Headers(bs) => return Poll::Ready(Ok(Event::Headers(bs.into()))),
                ParseResult::Body(bs) => return Poll::Ready(Ok(Event::Body(bs))),
                ParseResult::PartEnd => return Poll::Ready(Ok(Event::PartEnd)),
                ParseResult::Done => return Poll::Ready(Ok(Event::Done)),
                ParseResult::Err(e) => return Poll::Ready(Err(e)),
            }

            if self.inner_done {
                return Poll::Ready(Err(Error::malformed(
                    "body ended before the closing boundary",
                )));
            }

            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(chunk)) => self.parser.feed(chunk),
                Some(Err(e)) => return Poll::Ready(Err(Error::inner(e))),
                None => self.inner_done = true,
            }
        }
    }
}

/// The body of one part, as a stream of chunks in arrival order.
///
/// The stream ends at the part's closing delimiter. Framing errors and errors
/// of the underlying body are yielded once, after which the stream is over.
pub struct FilePart<S> {
    multipart: Multipart<S>,
    headers: PartHeaders,
    finished: bool,
}

impl<S> FilePart<S> {
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    pub fn filename(&self) -> Option<&str> {
        self.headers.filename()
    }
}

impl<S, E> Stream for FilePart<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let event = ready!(self.multipart.poll_event(cx));

        match event {
            Ok(Event::Body(bs)) => Poll::Ready(Some(Ok(bs))),

            Ok(Event::PartEnd) | Ok(Event::Done) => {
                self.finished = true;
                Poll::Ready(None)
            }

            Ok(Event::Headers(_)) => {
                self.finished = true;
                Poll::Ready(Some(Err(Error::malformed("headers inside a part body"))))
            }

            Err(e) => {
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}
