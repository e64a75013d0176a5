use std::fmt::Debug;

use seqmm_tensor::{DevicePtr, Stream};

use crate::error::{KernelError, Result};

/// Whether a GEMM operand is used as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    NoTrans,
    Trans,
}

impl Transpose {
    /// `Trans` when `transpose` is set.
    pub fn from_flag(transpose: bool) -> Self {
        if transpose {
            Transpose::Trans
        } else {
            Transpose::NoTrans
        }
    }

    /// Whether the operand is transposed.
    pub fn is_trans(&self) -> bool {
        matches!(self, Transpose::Trans)
    }
}

/// One pointer-array batched GEMM launch.
///
/// Every matrix is row-major. For batch entry `i`, with `A_i`, `B_i`, `C_i`
/// the addresses stored at index `i` of `a_array`, `b_array`, `c_array`:
///
/// ```text
/// C_i[r * ldc + c] = alpha * sum_p op(A_i)[r, p] * op(B_i)[p, c] + beta * C_i[r * ldc + c]
/// ```
///
/// where `op(A)` is `m x k` and `op(B)` is `k x n`. With `beta == 0` the
/// previous contents of `C_i` are never read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchedGemm {
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub alpha: f32,
    /// Device array of `batch_count` pointers to A matrices.
    pub a_array: DevicePtr,
    pub lda: usize,
    /// Device array of `batch_count` pointers to B matrices.
    pub b_array: DevicePtr,
    pub ldb: usize,
    pub beta: f32,
    /// Device array of `batch_count` pointers to C matrices.
    pub c_array: DevicePtr,
    pub ldc: usize,
    pub batch_count: usize,
}

impl BatchedGemm {
    /// Rows and columns of A as stored.
    pub fn a_stored(&self) -> (usize, usize) {
        match self.trans_a {
            Transpose::NoTrans => (self.m, self.k),
            Transpose::Trans => (self.k, self.m),
        }
    }

    /// Rows and columns of B as stored.
    pub fn b_stored(&self) -> (usize, usize) {
        match self.trans_b {
            Transpose::NoTrans => (self.k, self.n),
            Transpose::Trans => (self.n, self.k),
        }
    }

    /// Elements spanned by one A, B and C matrix given the leading dimensions.
    ///
    /// A matrix with no rows or no columns spans nothing.
    pub fn extents(&self) -> (usize, usize, usize) {
        let span = |(rows, cols): (usize, usize), ld: usize| {
            if rows == 0 || cols == 0 {
                0
            } else {
                (rows - 1) * ld + cols
            }
        };
        (
            span(self.a_stored(), self.lda),
            span(self.b_stored(), self.ldb),
            span((self.m, self.n), self.ldc),
        )
    }

    /// Check dimensions and leading dimensions before anything is enqueued.
    pub fn validate(&self) -> Result<()> {
        if self.m == 0 || self.n == 0 || self.k == 0 || self.batch_count == 0 {
            return Err(KernelError::Backend(format!(
                "sgemm_batched: empty problem m={} n={} k={} batch_count={}",
                self.m, self.n, self.k, self.batch_count
            )));
        }
        let checks = [
            ("lda", self.lda, self.a_stored().1),
            ("ldb", self.ldb, self.b_stored().1),
            ("ldc", self.ldc, self.n),
        ];
        for (name, ld, min) in checks {
            if ld < min {
                return Err(KernelError::Backend(format!(
                    "sgemm_batched: {}={} but must be at least {}",
                    name, ld, min
                )));
            }
        }
        Ok(())
    }
}

/// Capability interface for a numerical library that performs pointer-array
/// batched matrix multiplication.
///
/// Implementations must submit all work through the given stream and must
/// not reorder it relative to other work on that stream: the caller relies
/// on operations enqueued earlier (such as the upload of the pointer arrays)
/// having completed on the device before the multiply reads them. A call
/// returns once the work is enqueued, not once it has run.
pub trait BatchedMultiplyBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "host", "cublas").
    fn name(&self) -> &str;

    /// Enqueue `gemm.batch_count` independent f32 matrix multiplications.
    fn sgemm_batched(&self, stream: &Stream, gemm: &BatchedGemm) -> Result<()>;
}
