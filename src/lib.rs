//! Streams a CSV upload back to the client after checking its first bytes.
//!
//! A `multipart/form-data` request is read lazily, the `file` part is
//! located, and the head of that part is validated. If it looks like
//! delimited text the whole part, head included, is relayed to the response
//! as it arrives; otherwise the request is answered with a plain text reason.

mod error;
pub use error::Error;

mod header_map;
pub use header_map::HeaderMap;

mod parser;
pub use parser::MAX_HEADER_SIZE;

mod part;
pub use part::PartHeaders;

mod multipart;
pub use multipart::{FilePart, Multipart, DEFAULT_BUFFER_CAP};

mod source;
pub use source::{ChunkSource, Replay, ReplaySource};

mod validator;
pub use validator::{validate, ValidationResult};

mod pipeline;
pub use pipeline::{Outcome, Pipeline, DEFAULT_VALIDATION_BYTES};

mod config;
pub use config::Config;

pub mod response;
pub mod server;

use bytes::Bytes;
use futures::Stream;

/// Reads a multipart body whose boundary is given by `headers`.
pub fn from_headers<S, E>(headers: &impl HeaderMap, s: S) -> Result<Multipart<S>, Error>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    Multipart::from_headers(headers, s)
}
