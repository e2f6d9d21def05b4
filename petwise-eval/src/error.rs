use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("evaluation log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("evaluation log encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid log path: {0}")]
    Path(String),
}
