/// Convenience result type used across Stagehand.
pub type MixResult<T> = Result<T, MixError>;

/// Errors surfaced by the engine's public operations.
///
/// Pool exhaustion is not represented here: it is signalled by `None` from
/// [`FrameForwarder::get_for_writing`](crate::FrameForwarder::get_for_writing) and counted.
/// Broken reference-count bookkeeping is not represented either; it aborts through
/// [`protocol_violation`].
#[derive(thiserror::Error, Debug)]
pub enum MixError {
    /// Invalid or incomplete configuration, found before the engine starts.
    #[error("config error: {0}")]
    Config(String),

    /// A control request named a stage, scene or source that does not exist.
    #[error("no such {kind}: {name}")]
    UnknownName {
        /// What kind of object was looked up (`stage`, `scene`, `source`).
        kind: &'static str,
        /// The name that could not be resolved.
        name: String,
    },

    /// A producer or consumer failed talking to its external process or device.
    #[error("io error: {0}")]
    Io(String),

    /// A payload could not be laid out into a frame.
    #[error("decode error: {0}")]
    Decode(String),

    /// Anything else, with context attached by the caller.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MixError {
    /// Build a [`MixError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`MixError::UnknownName`] value.
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownName {
            kind,
            name: name.into(),
        }
    }

    /// Build a [`MixError::Io`] value.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Build a [`MixError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Prefix a config error's message with where it was found.
    pub fn within(self, place: impl std::fmt::Display) -> Self {
        match self {
            Self::Config(msg) => Self::Config(format!("{place}: {msg}")),
            other => Self::Config(format!("{place}: {other}")),
        }
    }

    /// Return `true` for errors a control-plane caller caused and can correct.
    pub fn is_user_request(&self) -> bool {
        matches!(self, Self::UnknownName { .. })
    }
}

/// Abort on broken frame bookkeeping.
///
/// Continuing after one of these would let a writer scribble over a buffer that a reader
/// still holds, so there is no recoverable variant.
#[track_caller]
pub fn protocol_violation(stream: &str, what: &str) -> ! {
    tracing::error!(stream = %stream, "frame protocol violation: {what}");
    panic!("frame protocol violation on '{stream}': {what}");
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
