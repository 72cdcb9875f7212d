//! Collaborator error types.

/// Errors from talking to a sidecar or the chat model.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Transport failure, timeout, or client construction error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Status {
        /// Which collaborator answered.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {service}: {message}")]
    Decode {
        /// Which collaborator answered.
        service: &'static str,
        /// Decoder message.
        message: String,
    },

    /// Upload exceeds the configured limit.
    #[error("payload too large: {size} bytes (max {max})")]
    TooLarge {
        /// Actual size.
        size: usize,
        /// Configured maximum.
        max: u64,
    },

    /// The chat model returned no content.
    #[error("chat model returned an empty reply")]
    EmptyReply,
}

impl AssistantError {
    /// Whether the collaborator rejected the input itself (4xx), as opposed
    /// to failing.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
            || matches!(self, Self::TooLarge { .. })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AssistantError>;
