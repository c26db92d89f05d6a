//! Icon request error taxonomy
//!
//! Every variant is answered with a 404; the `Display` text is the response body.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IconError {
    /// Path has no trailing `.<ext>`
    #[error("File not found")]
    NoExtension,

    /// Extension outside of png/webp/svg
    #[error("Format not supported")]
    UnsupportedFormat,

    /// Upstream answered non-success or could not be reached
    #[error("File not found")]
    UpstreamUnavailable,

    /// External URL missing, not absolute http(s), failed, or not an `.svg`
    #[error("Invalid external SVG")]
    InvalidExternalTarget,
}

impl IconError {
    /// Reason text sent as the 404 body
    pub fn reason(self) -> String {
        self.to_string()
    }
}
