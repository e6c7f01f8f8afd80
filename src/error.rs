use thiserror::Error;

/// Failures while building a catalog from one of its sources.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The source answered, but not with something we can call a catalog.
    #[error("bad catalog source: {0}")]
    BadSource(String),

    /// The stored payload did not decode to an array of entries.
    #[error("bad catalog payload: {0}")]
    BadPayload(String),

    /// A single entry could not be canonicalised. The whole load is rejected.
    #[error("{0}")]
    InvalidEntry(String),

    #[error("catalog request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("catalog payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    /// Configuration problems need the user to fix their settings; the rest
    /// are service problems.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CatalogError::BadPayload(_) | CatalogError::InvalidEntry(_) | CatalogError::Json(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("the payload must be valid JSON and formatted as an array of catalog entries")]
    PayloadNotArray,

    #[error("unable to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ImageryError {
    #[error("GeoTIFF imagery provider is unavailable in this build.")]
    Unsupported,

    #[error("imagery request for '{url}' failed: {reason}")]
    Load { url: String, reason: String },

    #[error("unable to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("camera flight was interrupted")]
    FlightCancelled,

    #[error("viewer error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("media capture is not supported: {0}")]
    Unsupported(String),

    #[error("capture task ended abnormally: {0}")]
    Interrupted(String),

    #[error("unable to write recording: {0}")]
    Io(#[from] std::io::Error),
}
