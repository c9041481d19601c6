use std::path::PathBuf;

use crate::validate::{Diagnostic, Severity};

/// Startup-time configuration failure. Never raised once events flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: .{ext}")]
    UnsupportedFormat { ext: String },

    #[error("missing required setting `{field}`")]
    Missing { field: &'static str },

    #[error("invalid value for `{field}`: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: mediarelay_common::Error,
    },

    #[error("invalid configuration: {summary}")]
    Invalid {
        summary: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }

    #[must_use]
    pub fn invalid_value(field: impl Into<String>, source: mediarelay_common::Error) -> Self {
        Self::InvalidValue {
            field: field.into(),
            source,
        }
    }

    /// Build an [`Error::Invalid`] from the error-severity diagnostics.
    #[must_use]
    pub fn invalid(diagnostics: Vec<Diagnostic>) -> Self {
        let summary = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| format!("{}: {}", d.path, d.message))
            .collect::<Vec<_>>()
            .join("; ");
        Self::Invalid {
            summary,
            diagnostics,
        }
    }
}

impl mediarelay_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

/// Alias used where the error taxonomy is spelled out.
pub type ConfigurationError = Error;

pub type Result<T> = std::result::Result<T, Error>;

mediarelay_common::impl_context!();
