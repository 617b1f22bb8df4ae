//! Error types for report relay
//!
//! Errors are classified by who needs to hear about them:
//! - Sender-facing: retrieval, extraction and parse failures get a visible notice
//! - Recipient delivery: logged, with a best-effort notice back to the sender
//! - Configuration: fatal at startup

use thiserror::Error;

use crate::extract::ExtractError;
use crate::parser::ParseError;

/// Error types for a single relay attempt or startup
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Could not download the file: {0}")]
    Retrieval(String),

    #[error("Could not read the file: {0}")]
    Extraction(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Could not deliver the summary: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Returns true if the original sender should get a visible notice.
    ///
    /// Delivery failures still get one, but only best-effort; that is decided
    /// by the pipeline, not here.
    pub fn notifies_sender(&self) -> bool {
        matches!(
            self,
            RelayError::Retrieval(_)
                | RelayError::Extraction(_)
                | RelayError::Parse(_)
                | RelayError::Delivery(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RelayError::Retrieval(_) => "Try uploading the file again.",
            RelayError::Extraction(_) => "Export the report as a PDF and upload it again.",
            RelayError::Parse(_) => {
                "Make sure this is a summary export that shows the total hours."
            }
            RelayError::Delivery(_) => "The summary was not sent. Please forward it manually.",
            RelayError::Configuration(_) => {
                "Check ~/.timesheet-relay/config.json and the RELAY_* environment variables."
            }
        }
    }
}

impl From<ExtractError> for RelayError {
    fn from(err: ExtractError) -> Self {
        RelayError::Extraction(err.to_string())
    }
}
