use std::error::Error as StdError;

/// Failures inside one relay job.
///
/// None of these escape [`MediaRelayPipeline::run`](crate::MediaRelayPipeline::run):
/// transfer failures become a failure [`Outcome`](crate::Outcome), cleanup and
/// notification failures are logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or Bot API failure during download, upload, or messaging.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Local file I/O failure.
    #[error("{context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("thumbnail unavailable: {0}")]
    Thumbnail(#[from] mediarelay_media::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn resource(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
