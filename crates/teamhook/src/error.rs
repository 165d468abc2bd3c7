use std::fmt;

use thiserror::Error;

use crate::template::TemplateError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single notification.
///
/// There is no partial success: a notification either returns `Ok(true)` or
/// one of these variants. Messages embed the offending input (trigger name,
/// URL, raw response body).
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Unknown trigger type: [{0}].")]
    InvalidTrigger(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Webhook URL is malformed: [{url}]: {reason}.")]
    Url { url: String, reason: String },

    #[error("Error {stage} webhook URL: [{source}].")]
    Connection {
        stage: ConnectionStage,
        #[source]
        source: BoxError,
    },

    /// `payload` is the rendered message that was sent.
    #[error(
        "Unknown status returned from webhook: [{body}].\npayload={}",
        url_encoded(.payload)
    )]
    Response { body: String, payload: String },
}

impl NotifyError {
    pub(crate) fn connection(stage: ConnectionStage, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            stage,
            source: source.into(),
        }
    }

    /// True when the endpoint was reached but did not acknowledge the message.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Response { .. })
    }
}

fn url_encoded(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// Step of the HTTP exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStage {
    Open,
    Send,
    Read,
}

impl fmt::Display for ConnectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStage::Open => "opening connection to",
            ConnectionStage::Send => "putting data to",
            ConnectionStage::Read => "reading response from",
        };
        f.write_str(s)
    }
}
