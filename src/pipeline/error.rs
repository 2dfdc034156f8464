//! Pipeline error types.

use super::Stage;
use crate::config::ConfigError;
use crate::utils::exec::ExecError;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Failure of a single stage action.
#[derive(Debug, Error)]
pub enum StageError {
    /// A required input (descriptor, config file) is absent.
    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    /// An external tool ran and reported an error.
    #[error("{tool} reported errors\n{message}")]
    ToolFailure { tool: String, message: String },

    /// A copy or write failed.
    #[error("IO error at `{0}`")]
    Io(PathBuf, #[source] io::Error),

    /// An external tool could not be started.
    #[error("failed to start `{program}`")]
    Process {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A configuration file exists but is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StageError {
    /// Wrap an IO error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |err| Self::Io(path, err)
    }
}

impl From<ExecError> for StageError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Spawn { program, source } => Self::Process { program, source },
            ExecError::Failed { program, message } => Self::ToolFailure {
                tool: program,
                message,
            },
        }
    }
}

/// The single error reported by the sequencer: which stage failed and why.
#[derive(Debug, Error)]
#[error("{stage} failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    /// The stage error followed by its causes, one per line.
    pub fn detail(&self) -> String {
        let mut lines = vec![self.source.to_string()];
        let mut cause = std::error::Error::source(&self.source);
        while let Some(err) = cause {
            lines.push(err.to_string());
            cause = err.source();
        }
        lines.join("\n")
    }
}
