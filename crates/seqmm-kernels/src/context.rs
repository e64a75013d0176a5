use std::sync::Arc;

use seqmm_tensor::{Device, Stream};

use crate::backend::BatchedMultiplyBackend;
use crate::cpu::HostBlas;

/// Execution context handed to a kernel by the dispatch layer.
///
/// Owns the device handle, the compute stream assigned to the kernel, and the
/// numerical library used for batched multiplies.
#[derive(Debug, Clone)]
pub struct AcceleratorContext {
    device: Device,
    stream: Stream,
    blas: Option<Arc<dyn BatchedMultiplyBackend>>,
}

impl AcceleratorContext {
    /// Create a context without a numerical library attached.
    pub fn new(device: Device, stream: Stream) -> Self {
        Self {
            device,
            stream,
            blas: None,
        }
    }

    /// A context on a fresh stream of `device`, backed by [`HostBlas`].
    pub fn host(device: &Device) -> Self {
        Self::new(device.clone(), device.create_stream()).with_blas(Arc::new(HostBlas::new()))
    }

    /// Attach the numerical library used for batched multiplies.
    pub fn with_blas(mut self, blas: Arc<dyn BatchedMultiplyBackend>) -> Self {
        self.blas = Some(blas);
        self
    }

    /// The device that owns the stream and all operand memory.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The stream all of this context's work is enqueued on.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// The attached numerical library, if any.
    pub fn blas(&self) -> Option<&Arc<dyn BatchedMultiplyBackend>> {
        self.blas.as_ref()
    }
}
