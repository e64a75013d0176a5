use seqmm_tensor::TensorError;
use thiserror::Error;

/// The execution environment is incomplete or inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("running context should be set first")]
    MissingContext,
    #[error("batched multiply backend should be initialized first")]
    MissingBlas,
    #[error("address table has not been prepared")]
    TableNotPrepared,
    #[error("address table holds {capacity} sequences but {needed} were requested")]
    TableTooSmall { needed: usize, capacity: usize },
    #[error("kernel already registered for {0}")]
    DuplicateKernel(String),
    #[error("no kernel registered for {0}")]
    KernelNotFound(String),
}

/// Operand shapes violate the operator's contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("K of Input(X) ({x_k}) and Input(Y) ({y_k}) is not equal")]
    ContractionMismatch { x_k: usize, y_k: usize },
    #[error("Input({operand}) has no sequence offset list")]
    MissingLod { operand: &'static str },
    #[error("Input({operand}) has rank {rank}, expected 2")]
    Rank { operand: &'static str, rank: usize },
    #[error("Input({operand}) holds no sequences")]
    NoSequences { operand: &'static str },
    #[error("Input({operand}) has zero-sized rows")]
    EmptyRows { operand: &'static str },
    #[error("Input({operand}) has {rows} rows but its offset list covers {covered}")]
    LodRowMismatch {
        operand: &'static str,
        rows: usize,
        covered: usize,
    },
    #[error("Input({operand}) has sequences of differing lengths")]
    Unaligned { operand: &'static str },
    #[error("Input(X) has {x} sequences but Input(Y) has {y}")]
    SequenceCountMismatch { x: usize, y: usize },
    #[error("Out has {output} sequences but the inputs have {inputs}")]
    OutputCountMismatch { inputs: usize, output: usize },
    #[error("sequence {index} with stride {stride} overruns a buffer of {len} elements")]
    SequenceOutOfBounds {
        index: usize,
        stride: usize,
        len: usize,
    },
}

/// Host or device memory could not be obtained.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("host allocation of {bytes} bytes failed")]
    HostAllocation { bytes: usize },
    #[error("device allocation failed: {0}")]
    DeviceAllocation(TensorError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

/// Coarse classification of a [`KernelError`], for dispatch-layer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Shape,
    Resource,
    Backend,
    Tensor,
}

impl KernelError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Configuration(_) => ErrorKind::Configuration,
            KernelError::Shape(_) => ErrorKind::Shape,
            KernelError::Resource(_) => ErrorKind::Resource,
            KernelError::Backend(_) => ErrorKind::Backend,
            KernelError::Tensor(_) => ErrorKind::Tensor,
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
