use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("LINE error: {0}")]
    Line(String),

    #[error("Discord error: {0}")]
    Discord(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
