use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure, including request timeouts.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx reply. Status text and response body are both kept so the
    /// console can surface them to the operator verbatim.
    #[error("{status}: {body}")]
    Status { status: String, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_surfaces_body() {
        let err = ClientError::Status {
            status: "502 Bad Gateway".into(),
            body: "delegator down".into(),
        };
        let text = err.to_string();
        assert!(text.contains("502 Bad Gateway"));
        assert!(text.contains("delegator down"));
    }
}
