use thiserror::Error;

use crate::toolkit::WidgetId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown widget {0:?}")]
    UnknownWidget(WidgetId),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid {what}: {value:?}")]
    InvalidValue { what: &'static str, value: String },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}

impl Error {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}
