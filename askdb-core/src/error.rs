use thiserror::Error;

#[derive(Error, Debug)]
pub enum AskdbError {
    #[error("{0}")]
    Validation(String),

    #[error("Upstream error ({code}): {body}")]
    UpstreamStatus { code: u16, body: String },

    #[error("Malformed upstream reply: {0}")]
    MalformedReply(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}
