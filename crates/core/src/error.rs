use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("required environment variable not set: {0}")]
    MissingEnv(String),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
