use thiserror::Error;

/// Errors raised while reading or editing `gamelist.xml`.
#[derive(Debug, Error)]
pub enum GamelistError {
    /// The gamelist file does not exist where expected
    #[error("gamelist not found: {0}")]
    NotFound(String),

    /// I/O error while reading or writing the gamelist
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The XML is malformed
    #[error("Invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute could not be decoded
    #[error("Invalid XML attribute: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
}

/// Errors from the translation service or the batch pipeline around it.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected service response: {0}")]
    BadResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Gamelist error: {0}")]
    Gamelist(#[from] GamelistError),
}

impl TranslateError {
    pub fn bad_response(msg: impl Into<String>) -> Self {
        Self::BadResponse(msg.into())
    }
}

/// Errors from a single compression job.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The job refused to touch a file inside a backup directory
    #[error("refusing to process file inside a backup directory: {0}")]
    InBackupDir(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external prober returned unusable output
    #[error("probe failed: {0}")]
    Probe(String),

    /// The external encoder exited with an error
    #[error("encode failed: {0}")]
    Encode(String),

    /// The external encoder ran past its deadline
    #[error("encode timed out after {0}s")]
    Timeout(u64),

    /// The encoder claimed success but produced no usable file
    #[error("encoder output missing or empty: {0}")]
    EmptyOutput(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompressError {
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
