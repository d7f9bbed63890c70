use crate::Error;

/// A header source, implemented for http::HeaderMap.
/// Anything that can hand out header values as text can locate the
/// multipart boundary of a request.
pub trait HeaderMap {
    fn get_value<K>(&self, header_key: K) -> Result<Option<&str>, Error>
    where
        K: AsRef<str>;

    /// Reads the boundary parameter of a `multipart/form-data` Content-Type.
    fn multipart_boundary(&self) -> Result<String, Error> {
        let content_type = self
            .get_value("content-type")?
            .ok_or(Error::ContentTypeMissing)?;

        let mime_type = content_type
            .parse::<mime::Mime>()
            .map_err(Error::InvalidMimeType)?;

        if mime_type.type_() != mime::MULTIPART || mime_type.subtype() != mime::FORM_DATA {
            return Err(Error::NotMultipart);
        }

        let boundary = mime_type
            .get_param(mime::BOUNDARY)
            .map(|b| b.as_str().trim_matches('"').to_string())
            .unwrap_or_default();

        if boundary.is_empty() {
            return Err(Error::malformed("mime param boundary missing"));
        }

        Ok(boundary)
    }
}

impl HeaderMap for http::header::HeaderMap {
    fn get_value<K>(&self, header_key: K) -> Result<Option<&str>, Error>
    where
        K: AsRef<str>,
    {
        match self.get(header_key.as_ref()) {
            Some(hv) => hv.to_str().map(Some).map_err(Error::InvalidHeader),
            None => Ok(None),
        }
    }
}
