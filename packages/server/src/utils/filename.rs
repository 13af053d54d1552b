/// Why an upload filename was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Filename is `.` or `..`.
    PathTraversal,
    /// Filename contains null bytes.
    NullByte,
    /// Filename contains control characters (CR, LF, etc.).
    ControlCharacter,
    /// Filename is longer than 255 bytes.
    TooLong,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::PathTraversal => "Invalid filename: '..' is not allowed",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
            Self::TooLong => "Invalid filename: longer than 255 bytes",
        }
    }
}

/// Display name of an uploaded file.
///
/// Browsers may send a full client path (`C:\fakepath\notes.pdf`); only the
/// last component is kept.
pub fn upload_filename(raw: &str) -> Result<String, FilenameError> {
    if raw.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim();

    if name.is_empty() {
        return Err(FilenameError::Empty);
    }
    // Rejected to prevent HTTP header injection (CRLF in Content-Disposition).
    if name.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if name == "." || name == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if name.len() > 255 {
        return Err(FilenameError::TooLong);
    }

    Ok(name.to_string())
}

/// Build a safe `Content-Disposition` header value.
pub fn content_disposition_value(disposition: &str, filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("{disposition}; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
