use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Bad base URL or client settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection refused, timeout, or a dropped body.
    #[error("network error: {0}")]
    Network(String),

    /// The model server answered with a non-2xx status.
    #[error("model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),
}
