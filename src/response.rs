//! Turns upload outcomes and errors into HTTP responses.
//!
//! Every response is `text/plain`. Accepted uploads are streamed back with
//! chunked transfer encoding, everything else gets a one-line reason.

use bytes::Bytes;
use futures::TryStreamExt;
use http::{
    header::{HeaderValue, ALLOW, CONTENT_TYPE},
    Response, StatusCode,
};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full, StreamBody};
use hyper::body::Frame;

use crate::{pipeline::Outcome, source::ChunkSource, Error};

pub type ResponseBody = UnsyncBoxBody<Bytes, Error>;

pub const EMPTY_FILE: &str = "Empty file";

/// A plain text response with the given status.
pub fn text<T: Into<Bytes>>(status: StatusCode, msg: T) -> Response<ResponseBody> {
    let body = Full::new(msg.into())
        .map_err(|never| match never {})
        .boxed_unsync();

    with_status(status, body)
}

fn with_status(status: StatusCode, body: ResponseBody) -> Response<ResponseBody> {
    let mut res = Response::new(body);
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    res
}

pub fn from_outcome<S>(outcome: Outcome<S>) -> Response<ResponseBody>
where
    S: ChunkSource + Send + 'static,
{
    match outcome {
        Outcome::Accepted(replay) => {
            let body = StreamBody::new(replay.map_ok(Frame::data)).boxed_unsync();
            with_status(StatusCode::OK, body)
        }
        Outcome::Empty => text(StatusCode::BAD_REQUEST, EMPTY_FILE),
        Outcome::Rejected { reason } => text(StatusCode::BAD_REQUEST, reason),
        Outcome::Failed(e) => processing_error(&e),
    }
}

/// Response for a request that could not be turned into an upload.
pub fn from_error(e: &Error) -> Response<ResponseBody> {
    match *e {
        _ if e.is_unsupported_media_type() => {
            text(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
        }
        Error::PartMissing(_) => text(StatusCode::BAD_REQUEST, e.to_string()),
        _ => processing_error(e),
    }
}

fn processing_error(e: &Error) -> Response<ResponseBody> {
    text(
        StatusCode::BAD_REQUEST,
        format!("Error processing file: {}", e),
    )
}

pub fn not_found() -> Response<ResponseBody> {
    text(StatusCode::NOT_FOUND, "Not found")
}

pub fn method_not_allowed(allow: &'static str) -> Response<ResponseBody> {
    let mut res = text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    res.headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    res
}
