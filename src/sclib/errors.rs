use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong in a comparison run
#[derive(Debug, Error)]
pub enum RcError {
    /// Bad inputs or arguments. Fatal, aborts the run
    #[error("configuration error: {0}")]
    Config(String),

    /// Detection model could not be built. Fatal at startup
    #[error("null model error: {0}")]
    NullModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}:{line}: {msg}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    /// Unexpected problem while comparing one scaffold. Recovered by the scheduler
    #[error("scaffold {scaffold}: {msg}")]
    Scaffold { scaffold: String, msg: String },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RcError {
    pub fn parse(path: &std::path::Path, line: usize, msg: impl Into<String>) -> Self {
        RcError::Parse {
            path: path.to_path_buf(),
            line,
            msg: msg.into(),
        }
    }
}
