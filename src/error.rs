use std::{error::Error as StdError, fmt};

#[derive(Debug)]
pub enum Error {
    /// The request carried no Content-Type header.
    ContentTypeMissing,
    NotMultipart,
    InvalidHeader(http::header::ToStrError),
    InvalidMimeType(mime::FromStrError),
    MalformedMultipart(String),
    /// The multipart body ended without a part of the requested name.
    PartMissing(String),
    InnerStream(String),
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedMultipart(msg.into())
    }

    pub(crate) fn inner<E: fmt::Display>(e: E) -> Self {
        Error::InnerStream(format!("{}", e))
    }

    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// True for errors caused by the request's headers rather than its body.
    pub fn is_unsupported_media_type(&self) -> bool {
        match *self {
            Error::ContentTypeMissing
            | Error::NotMultipart
            | Error::InvalidHeader(_)
            | Error::InvalidMimeType(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ContentTypeMissing => write!(f, "Content-Type header missing from request"),
            Error::NotMultipart => write!(f, "Request content type is not multipart/form-data"),
            Error::InvalidHeader(ref e) => write!(f, "Header value is not valid text: {}", e),
            Error::InvalidMimeType(ref e) => write!(f, "Content-Type value invalid: {}", e),
            Error::MalformedMultipart(ref msg) => write!(f, "Malformed multipart: {}", msg),
            Error::PartMissing(ref name) => write!(f, "Required part '{}' is not present", name),
            Error::InnerStream(ref e) => write!(f, "{}", e),
            Error::InvalidConfig(ref msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::InvalidHeader(ref e) => Some(e),
            Error::InvalidMimeType(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(inner: std::io::Error) -> Self {
        Error::inner(inner)
    }
}
