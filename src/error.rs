//! Error type shared by the chain builder, the stages and the runner.

use thiserror::Error;

/// Errors raised while building or running a filter pipeline.
///
/// Configuration variants are raised before any record flows. The
/// remaining variants surface from a running pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("bad column argument '{arg}' in filter '{token}'")]
    BadColumn { token: String, arg: String },

    #[error("invalid regular expression '{pattern}' in filter '{token}': {source}")]
    BadPattern {
        token: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("filter '{token}' is missing its {what} argument")]
    MissingArgument { token: String, what: &'static str },

    #[error("filter '{token}' has unexpected argument '{arg}'")]
    UnexpectedArgument { token: String, arg: String },

    #[error("you must specify at least one filter")]
    EmptyChain,

    #[error("invalid delimiter '{0}': expected a single ASCII character")]
    InvalidDelimiter(String),

    #[error("{stage}: column {column} is out of range for a row of width {width}")]
    ColumnOutOfRange {
        stage: &'static str,
        column: usize,
        width: usize,
    },

    #[error("failed to read input: {0}")]
    Source(#[source] csv::Error),

    #[error("failed to write output: {0}")]
    Sink(#[source] csv::Error),

    #[error("stage '{0}' terminated abnormally")]
    StagePanicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn column_out_of_range(stage: &'static str, column: usize, width: usize) -> Self {
        PipelineError::ColumnOutOfRange {
            stage,
            column,
            width,
        }
    }

    /// True for errors detected while building the chain or reading flags.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::BadColumn { .. }
                | PipelineError::BadPattern { .. }
                | PipelineError::MissingArgument { .. }
                | PipelineError::UnexpectedArgument { .. }
                | PipelineError::EmptyChain
                | PipelineError::InvalidDelimiter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
