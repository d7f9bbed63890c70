use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION};

/// The header block of a single multipart part.
#[derive(Debug, Clone)]
pub struct PartHeaders {
    headers: HeaderMap<HeaderValue>,
}

impl PartHeaders {
    /// Returns an iterator over all the headers lines, with their line endings trimmed.
    fn header_lines(data: &[u8]) -> impl Iterator<Item = Result<&str, std::str::Utf8Error>> {
        data.split(|e| *e == b'\n').map(|line| {
            // trim of the last \r
            std::str::from_utf8(line).map(|s| s.trim())
        })
    }

    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.headers
    }

    /// The `name` parameter of the Content-Disposition header.
    pub fn name(&self) -> Option<&str> {
        self.disposition_param("name")
    }

    pub fn filename(&self) -> Option<&str> {
        self.disposition_param("filename")
    }

    fn disposition_param(&self, key: &str) -> Option<&str> {
        let value = self.headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;

        // form-data; name="file"; filename="users.csv"
        value.split(';').skip(1).find_map(|param| {
            let mut kv = param.splitn(2, '=');
            let k = kv.next()?.trim();
            let v = kv.next()?.trim();

            if k.eq_ignore_ascii_case(key) {
                Some(v.trim_matches('"'))
            } else {
                None
            }
        })
    }
}

fn parse_header_line(s: &str) -> Option<(HeaderName, HeaderValue)> {
    let mut parts = s.splitn(2, ':');

    let header_name = parts
        .next()
        .map(|s| HeaderName::from_bytes(s.trim().as_bytes()));

    let header_value = parts.next().map(|s| HeaderValue::from_str(s.trim()));

    match (header_name, header_value) {
        (Some(Ok(name)), Some(Ok(value))) => Some((name, value)),
        _ => None,
    }
}

impl From<Bytes> for PartHeaders {
    fn from(bs: Bytes) -> Self {
        let mut headers = HeaderMap::new();

        Self::header_lines(&bs)
            .filter_map(|line| line.ok())
            .filter_map(parse_header_line)
            .for_each(|(name, value)| {
                headers.append(name, value);
            });

        PartHeaders { headers }
    }
}
