use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("No element matches '{0}'")]
    ElementNotFound(String),

    #[error("Timed out after {waited:?} waiting for '{selector}'")]
    Timeout { selector: String, waited: Duration },

    #[error("Failed to navigate to page {page}: {reason}")]
    PageNavigation { page: u32, reason: String },

    #[error("Failed to activate menu #{index}: {reason}")]
    MenuActivation { index: usize, reason: String },

    #[error("Session could not be established: {0}")]
    SessionInit(String),

    #[error("Invalid page value '{0}'")]
    InvalidPageValue(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
