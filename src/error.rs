use thiserror::Error;

/// Camera acquisition and streaming failures.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open camera: {0}")]
    Open(String),

    #[error("failed to start camera stream: {0}")]
    Stream(String),

    #[error("failed to read camera frame: {0}")]
    Frame(String),

    /// The stream went away mid-read, typically because the session was
    /// torn down while a frame read was in flight. Logged, never surfaced.
    #[error("camera stream interrupted")]
    Interrupted,
}

impl DeviceError {
    /// Benign errors are logged but filtered from user-visible surfacing.
    pub fn is_benign(&self) -> bool {
        matches!(self, DeviceError::Interrupted)
    }
}

/// The segmentation model could not be initialized.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file not found: {0}")]
    NotFound(String),

    #[error("failed to initialize segmentation model: {0}")]
    Init(String),
}

/// A background image failed to resolve. Absorbed by the resolver: the
/// compositor falls back to a solid fill, the session never sees this.
#[derive(Debug, Error)]
pub enum BackgroundLoadError {
    #[error("unreadable background reference {reference}: {reason}")]
    Unreadable { reference: String, reason: String },

    #[error("failed to decode background image {reference}: {reason}")]
    Decode { reference: String, reason: String },
}

/// Snapshot export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no composed frame is available to export")]
    FrameNotReady,

    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

/// Fatal session initialization failures. Terminal for the session; the
/// user retries by re-entering the flow.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
}

impl SessionError {
    pub fn is_benign(&self) -> bool {
        matches!(self, SessionError::Device(e) if e.is_benign())
    }
}
