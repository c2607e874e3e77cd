use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The source document is absent and no persisted index exists to fall back on.
    #[error("Source document not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Persisted index artifacts are unreadable, inconsistent, or built with another embedder.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The language model call failed. `transient` marks failures worth retrying.
    #[error("Generation failed: {message}")]
    Generation { message: String, transient: bool },

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn generation(message: impl Into<String>, transient: bool) -> Self {
        Self::Generation { message: message.into(), transient }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generation { transient: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
