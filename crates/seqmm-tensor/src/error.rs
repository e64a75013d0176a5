use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: String, got: String },
    #[error("invalid offset list {offsets:?}: {reason}")]
    InvalidLod { offsets: Vec<usize>, reason: String },
    #[error("device out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("invalid device address {0:#x}")]
    InvalidAddress(u64),
    #[error("device range [{addr:#x}; {len}] overruns allocation of {capacity} elements")]
    OutOfBounds { addr: u64, len: usize, capacity: usize },
    #[error("stream {stream} failed: {message}")]
    StreamFailure { stream: usize, message: String },
    #[error("unsupported dtype: {0}")]
    UnsupportedDType(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
