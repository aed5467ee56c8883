use thiserror::Error;

/// Failure to construct an Immich client. Upload failures are outcomes, not
/// errors; see [`super::UploadOutcome`].
#[derive(Error, Debug)]
pub enum ImmichError {
    #[error("Invalid Immich URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("API key is not a valid header value")]
    InvalidApiKey,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
