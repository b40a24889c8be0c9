use thiserror::Error;

/// Problems the controller absorbs instead of returning to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackIssue {
    /// The platform has no usable speech capability.
    #[error("speech engine unavailable")]
    EngineUnavailable,
    /// The engine failed while speaking a chunk.
    #[error("speech engine error: {0}")]
    EngineError(String),
    /// The wake lock could not be acquired.
    #[error("wake lock denied: {0}")]
    WakeLockDenied(String),
    /// A paragraph outside the loaded chapter was requested.
    #[error("paragraph {index} out of range (chapter has {len})")]
    InvalidIndex { index: usize, len: usize },
}
