/// Verdict on the head of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted,
    Rejected { reason: String },
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        *self == ValidationResult::Accepted
    }
}

/// Checks that `prefix` looks like delimited text.
///
/// Every byte must be printable 7-bit ASCII or one of tab, LF and CR. Chunk
/// boundaries play no part: callers pass the prefix as one slice. Nothing
/// past the prefix is ever looked at, so a file can still carry binary data
/// further in.
pub fn validate(prefix: &[u8]) -> ValidationResult {
    if prefix.iter().copied().all(is_allowed) {
        return ValidationResult::Accepted;
    }

    ValidationResult::Rejected {
        reason: format!(
            "Invalid CSV format: first {} bytes contain invalid characters",
            prefix.len()
        ),
    }
}

fn is_allowed(b: u8) -> bool {
    if b.is_ascii_alphanumeric() {
        return true;
    }

    match b {
        b',' | b';' | b'\t' | b'"' | b'\'' | b' ' | b'\n' | b'\r' | b'.' | b'-' | b'_' | b'@'
        | b'#' | b'(' | b')' | b'[' | b']' | b'/' | b'\\' | b':' | b'+' => true,
        // Control bytes and anything outside 7-bit ASCII, DEL included.
        0..=31 | 127..=255 => false,
        _ => true,
    }
}
