use std::cell::RefCell;

/// Errors that can occur when talking to the OpenHMD backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenHmdError {
    /// Failure reported by the backend after a call. Bad indices, unplugged
    /// devices, unsupported parameters and I/O errors all land here.
    #[error("{0}")]
    Backend(String),

    /// Caller contract violated; detected before the backend was called.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The device's context was destroyed.
    #[error("Context destroyed")]
    ContextDestroyed,

    /// The backend library could not be loaded or refused to connect.
    #[error("Backend init failed: {0}")]
    BackendInit(String),
}

/// Most recent error seen by a context.
///
/// Only written, never cleared implicitly: callers learn about failures from
/// each operation's `Result`, this is for diagnostics after the fact.
#[derive(Debug, Default)]
pub(crate) struct LastError {
    message: RefCell<Option<String>>,
}

impl LastError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, err: &OpenHmdError) {
        *self.message.borrow_mut() = Some(err.to_string());
    }

    pub fn get(&self) -> Option<String> {
        self.message.borrow().clone()
    }
}
