pub mod gemm;

use gemm::sgemm;
use seqmm_tensor::{DevicePtr, Stream};

use crate::backend::{BatchedGemm, BatchedMultiplyBackend};
use crate::error::Result;

/// Pure-Rust reference implementation of [`BatchedMultiplyBackend`].
///
/// Each launch becomes one stream operation that dereferences the pointer
/// arrays in device memory and runs a straightforward row-major SGEMM per
/// batch entry. Optimized for correctness rather than peak performance.
#[derive(Debug, Clone)]
pub struct HostBlas;

impl HostBlas {
    /// Create the host backend.
    pub fn new() -> Self {
        HostBlas
    }
}

impl Default for HostBlas {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchedMultiplyBackend for HostBlas {
    fn name(&self) -> &str {
        "host"
    }

    fn sgemm_batched(&self, stream: &Stream, gemm: &BatchedGemm) -> Result<()> {
        gemm.validate()?;
        let gemm = *gemm;
        let (a_len, b_len, c_len) = gemm.extents();

        stream.enqueue("sgemm_batched", move |mem| {
            let batch = gemm.batch_count;
            let a_ptrs = mem.read::<DevicePtr>(gemm.a_array, batch)?.to_vec();
            let b_ptrs = mem.read::<DevicePtr>(gemm.b_array, batch)?.to_vec();
            let c_ptrs = mem.read::<DevicePtr>(gemm.c_array, batch)?.to_vec();

            for i in 0..batch {
                let a = mem.read::<f32>(a_ptrs[i], a_len)?.to_vec();
                let b = mem.read::<f32>(b_ptrs[i], b_len)?.to_vec();
                let c = mem.write::<f32>(c_ptrs[i], c_len)?;
                sgemm(&gemm, &a, &b, c);
            }
            Ok(())
        })?;
        Ok(())
    }
}
