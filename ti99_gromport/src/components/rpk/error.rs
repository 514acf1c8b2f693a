use std::fmt;
use std::fmt::Formatter;

use strum::Display;

/// Categories of RPK loading failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RpkErrorKind {
    #[strum(to_string = "Not a RPK (zip) file")]
    NotArchiveFormat,
    #[strum(to_string = "Module definition corrupt")]
    Corrupt,
    #[strum(to_string = "Out of memory")]
    OutOfMemory,
    #[strum(to_string = "XML format error")]
    XmlFormatError,
    #[strum(to_string = "Invalid file reference")]
    InvalidFileRef,
    #[strum(to_string = "Zip file error")]
    ZipError,
    #[strum(to_string = "Unsupported zip version")]
    ZipUnsupportedVersion,
    #[strum(to_string = "Missing RAM length")]
    MissingRamLength,
    #[strum(to_string = "Invalid RAM specification")]
    InvalidRamSpec,
    #[strum(to_string = "Unknown resource type")]
    UnknownResourceType,
    #[strum(to_string = "Invalid resource reference")]
    InvalidResourceReference,
    #[strum(to_string = "layout.xml not valid")]
    InvalidLayout,
    #[strum(to_string = "Missing layout")]
    MissingLayout,
    #[strum(to_string = "No pcb or resource found")]
    NoPcbOrResources,
    #[strum(to_string = "Unknown pcb type")]
    UnknownPcbType,
}

/// Error while opening an RPK cartridge package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpkError {
    pub kind: RpkErrorKind,
    pub detail: Option<String>,
}

impl RpkError {
    pub fn new(kind: RpkErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: RpkErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    /// Maps errors of the zip reader that occur while accessing an entry.
    pub(super) fn from_entry_error(err: zip::result::ZipError) -> Self {
        use zip::result::ZipError;
        match err {
            ZipError::UnsupportedArchive(detail) => {
                Self::with_detail(RpkErrorKind::ZipUnsupportedVersion, detail)
            }
            ZipError::InvalidArchive(detail) => {
                Self::with_detail(RpkErrorKind::Corrupt, detail.to_string())
            }
            other => Self::with_detail(RpkErrorKind::ZipError, other.to_string()),
        }
    }
}

impl fmt::Display for RpkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind, detail),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for RpkError {}

pub type RpkResult<T> = std::result::Result<T, RpkError>;
