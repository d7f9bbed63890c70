use crate::Error;
use bytes::{Buf, Bytes, BytesMut};

/// Largest header block accepted for a single part.
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

const CRLF: &[u8] = &[13, 10]; // "\r\n"
const HEADER_END: &[u8] = &[13, 10, 13, 10]; // "\r\n\r\n"
const BOUNDARY_LAST_PART_SENTINEL: &[u8] = &[45, 45]; // "--"

#[derive(Debug)]
pub(crate) enum ParseResult {
    /// More input is needed before anything else can be produced.
    NotReady,
    /// The raw header block of a new part, without the terminating blank line.
    Headers(Bytes),
    /// A piece of the current part's body.
    Body(Bytes),
    PartEnd,
    Done,
    Err(Error),
}

#[cfg(test)]
impl std::cmp::PartialEq for ParseResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParseResult::Done, ParseResult::Done) => true,
            (ParseResult::NotReady, ParseResult::NotReady) => true,
            (ParseResult::PartEnd, ParseResult::PartEnd) => true,
            (ParseResult::Err(_), ParseResult::Err(_)) => false,
            (ParseResult::Headers(ref bs), ParseResult::Headers(ref other_bs)) => bs == other_bs,
            (ParseResult::Body(ref bs), ParseResult::Body(ref other_bs)) => bs == other_bs,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preamble,
    Headers,
    Body,
    Done,
}

/// Incremental `multipart/form-data` tokenizer.
///
/// Input is handed over with [`feed`](BoundaryParser::feed) in chunks of any
/// size, [`parse`](BoundaryParser::parse) is then called until it reports
/// `NotReady`. Part bodies are handed out as soon as they are known not to
/// contain the delimiter, so at most one delimiter length of body bytes is
/// ever held back, no matter how large the part is.
///
/// The delimiter in front of a part body is `\r\n--boundary`; the CRLF is
/// considered part of the delimiter and never shows up in a body.
#[derive(Debug)]
pub(crate) struct BoundaryParser {
    // "--boundary"
    boundary: Vec<u8>,
    // "\r\n--boundary"
    delimiter: Vec<u8>,
    buffer: BytesMut,
    stage: Stage,
}

impl BoundaryParser {
    pub fn with_capacity<S: AsRef<str>>(boundary: S, capacity: usize) -> Self {
        let boundary = format!("--{}", boundary.as_ref());

        log::debug!("Creating with boundary: {:?}", boundary);

        let mut delimiter = CRLF.to_vec();
        delimiter.extend_from_slice(boundary.as_bytes());

        Self {
            boundary: boundary.into_bytes(),
            delimiter,
            buffer: BytesMut::with_capacity(capacity),
            stage: Stage::Preamble,
        }
    }

    pub fn feed<T: AsRef<[u8]>>(&mut self, chunk: T) {
        self.buffer.extend_from_slice(chunk.as_ref());
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Bytes received but not yet handed out.
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn parse(&mut self) -> ParseResult {
        let result = match self.stage {
            Stage::Preamble => self.parse_preamble(),
            Stage::Headers => self.parse_headers(),
            Stage::Body => self.parse_body(),
            Stage::Done => ParseResult::Done,
        };

        if let ParseResult::Err(_) = result {
            self.stage = Stage::Done;
            self.buffer.clear();
        }

        result
    }

    fn parse_preamble(&mut self) -> ParseResult {
        // The preamble, if any, is to be discarded.
        let boundary_len = self.boundary.len();

        match twoway::find_bytes(&self.buffer, &self.boundary) {
            None => {
                // Keep just enough to spot a boundary split over two chunks.
                let keep = boundary_len - 1;
                if self.buffer.len() > keep {
                    let discard = self.buffer.len() - keep;
                    self.buffer.advance(discard);
                }
                ParseResult::NotReady
            }

            Some(i) => {
                if self.buffer.len() < i + boundary_len + 2 {
                    return ParseResult::NotReady;
                }

                self.buffer.advance(i + boundary_len);

                match self.after_boundary() {
                    ParseResult::PartEnd => self.parse_headers(),
                    // A closing boundary straight away, the body had no parts.
                    other => other,
                }
            }
        }
    }

    fn parse_headers(&mut self) -> ParseResult {
        if self.buffer.len() < CRLF.len() {
            return ParseResult::NotReady;
        }

        // A part without any headers.
        if self.buffer.starts_with(CRLF) {
            self.buffer.advance(CRLF.len());
            self.stage = Stage::Body;
            return ParseResult::Headers(Bytes::new());
        }

        match twoway::find_bytes(&self.buffer, HEADER_END) {
            Some(i) => {
                let headers = self.buffer.split_to(i).freeze();
                self.buffer.advance(HEADER_END.len());
                self.stage = Stage::Body;
                ParseResult::Headers(headers)
            }

            None if self.buffer.len() > MAX_HEADER_SIZE => ParseResult::Err(Error::malformed(
                format!("part headers exceed {} bytes", MAX_HEADER_SIZE),
            )),

            None => ParseResult::NotReady,
        }
    }

    fn parse_body(&mut self) -> ParseResult {
        let delimiter_len = self.delimiter.len();

        match twoway::find_bytes(&self.buffer, &self.delimiter) {
            Some(0) => {
                if self.buffer.len() < delimiter_len + 2 {
                    return ParseResult::NotReady;
                }

                self.buffer.advance(delimiter_len);
                self.after_boundary()
            }

            Some(i) => ParseResult::Body(self.buffer.split_to(i).freeze()),

            None => {
                // Only a trailing CR can start a delimiter that is cut off by
                // the end of the buffer; everything in front of it is body.
                let tail_start = self.buffer.len().saturating_sub(delimiter_len - 1);
                let hold_from = self.buffer[tail_start..]
                    .iter()
                    .position(|b| *b == b'\r')
                    .map(|p| tail_start + p)
                    .unwrap_or_else(|| self.buffer.len());

                if hold_from == 0 {
                    ParseResult::NotReady
                } else {
                    ParseResult::Body(self.buffer.split_to(hold_from).freeze())
                }
            }
        }
    }

    /// Handles the two bytes following a boundary. The caller guarantees
    /// they are buffered.
    fn after_boundary(&mut self) -> ParseResult {
        let next = [self.buffer[0], self.buffer[1]];

        match &next[..] {
            CRLF => {
                // This is not the last part, just skip the linefeed.
                self.buffer.advance(2);
                self.stage = Stage::Headers;
                ParseResult::PartEnd
            }

            BOUNDARY_LAST_PART_SENTINEL => {
                log::debug!("Found stop sentinel");

                // Whatever follows is the epilogue.
                self.buffer.clear();
                let was_in_body = self.stage == Stage::Body;
                self.stage = Stage::Done;

                if was_in_body {
                    ParseResult::PartEnd
                } else {
                    ParseResult::Done
                }
            }

            slice => ParseResult::Err(Error::malformed(format!(
                "Boundary must be followed by `--` or `\\r\\n`, found: {:?}",
                slice
            ))),
        }
    }
}
