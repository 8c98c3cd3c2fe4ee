use thiserror::Error;

/// Errors produced while selecting tags, building a series or analyzing one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("Images already exist at prefix '{prefix}': {}. Use --force to overwrite", .existing.join(", "))]
    Conflict {
        prefix: String,
        existing: Vec<String>,
    },

    #[error("Command failed: {command}: {message}")]
    Collaborator { command: String, message: String },

    #[error("{} of {total} tags failed to process", .failed.len())]
    Incomplete { failed: Vec<String>, total: usize },

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Invalid tag filter '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a collaborator failure, folding multi-line stderr into one line.
    pub fn collaborator(command: impl Into<String>, message: impl AsRef<str>) -> Self {
        let message = message
            .as_ref()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        Error::Collaborator {
            command: command.into(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
