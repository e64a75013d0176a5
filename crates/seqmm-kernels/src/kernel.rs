use std::fmt;

use crate::context::AcceleratorContext;
use crate::error::Result;

/// Device class a kernel executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Host,
    Cuda,
    Any,
}

/// Element precision a kernel computes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Float,
    Fp16,
    Int8,
    Any,
}

/// Memory layout a kernel expects its tensors in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataLayout {
    Nchw,
    Nhwc,
    Any,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Host => write!(f, "host"),
            Target::Cuda => write!(f, "cuda"),
            Target::Any => write!(f, "any"),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Float => write!(f, "float"),
            Precision::Fp16 => write!(f, "fp16"),
            Precision::Int8 => write!(f, "int8"),
            Precision::Any => write!(f, "any"),
        }
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLayout::Nchw => write!(f, "nchw"),
            DataLayout::Nhwc => write!(f, "nhwc"),
            DataLayout::Any => write!(f, "any"),
        }
    }
}

/// Identifies a kernel implementation in a [`KernelRegistry`](crate::KernelRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub op_type: String,
    pub target: Target,
    pub precision: Precision,
    pub layout: DataLayout,
}

impl KernelKey {
    /// Build a key from its parts.
    pub fn new(
        op_type: impl Into<String>,
        target: Target,
        precision: Precision,
        layout: DataLayout,
    ) -> Self {
        KernelKey {
            op_type: op_type.into(),
            target,
            precision,
            layout,
        }
    }

    /// Whether a kernel registered under `self` can serve a request for
    /// `wanted`. `Any` on the registered side matches every value.
    pub fn matches(&self, wanted: &KernelKey) -> bool {
        self.op_type == wanted.op_type
            && (self.target == Target::Any || self.target == wanted.target)
            && (self.precision == Precision::Any || self.precision == wanted.precision)
            && (self.layout == DataLayout::Any || self.layout == wanted.layout)
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.op_type, self.target, self.precision, self.layout
        )
    }
}

/// Two-phase operator implementation driven by a dispatch layer.
///
/// The dispatcher attaches a context once, calls
/// [`prepare_for_run`](Kernel::prepare_for_run) before the first execution,
/// then calls [`run`](Kernel::run) any number of times. `run` only enqueues
/// work on the context's stream; results are visible after the stream is
/// synchronized.
pub trait Kernel: Send {
    type Param;

    fn name(&self) -> &str;

    fn set_context(&mut self, ctx: AcceleratorContext);

    fn context(&self) -> Option<&AcceleratorContext>;

    /// Acquire resources sized from the bound parameters.
    fn prepare_for_run(&mut self, param: &Self::Param) -> Result<()>;

    fn run(&mut self, param: &mut Self::Param) -> Result<()>;
}
