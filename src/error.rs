use thiserror::Error;

/// Everything the fetch → parse → filter → export pipeline can report.
///
/// None of these are fatal to a session: the caller shows the message and
/// the user corrects the input and tries again.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("failed to download map data: {0}")]
    Fetch(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("no visible points in the current map view, zoom or pan to include data")]
    NoVisibleData,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write export: {0}")]
    Io(String),
}

/// Problems with the downloaded bytes themselves.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("no KML file found in KMZ archive")]
    NoMarkupEntry,

    #[error("KMZ archive contains {0} KML files, expected exactly one")]
    MultipleMarkupEntries(usize),

    #[error("unreadable KMZ archive: {0}")]
    Archive(String),

    #[error("unparsable KML: {0}")]
    Markup(String),

    #[error("no coordinates found in KML")]
    NoPoints,
}

impl From<reqwest::Error> for ExportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExportError::Fetch("request timed out".to_string())
        } else {
            ExportError::Fetch(e.to_string())
        }
    }
}

impl From<zip::result::ZipError> for FormatError {
    fn from(e: zip::result::ZipError) -> Self {
        FormatError::Archive(e.to_string())
    }
}

impl From<roxmltree::Error> for FormatError {
    fn from(e: roxmltree::Error) -> Self {
        FormatError::Markup(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
