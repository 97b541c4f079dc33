use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("max_per_image ({max_per_image}) exceeds the symbol pool size ({pool})")]
    PoolTooSmall { max_per_image: usize, pool: usize },
    #[error("Nothing to generate: no {0} found")]
    Empty(&'static str),
    #[error("Malformed annotation line {line:?}: {reason}")]
    Annotation { line: String, reason: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
