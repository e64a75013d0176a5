use seqmm_tensor::DevicePtr;

use crate::backend::{BatchedGemm, Transpose};
use crate::error::{Result, ShapeError};
use crate::sequence::SequenceDescriptor;

/// Per-sequence multiply geometry derived from operand descriptors and
/// transpose flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmGeometry {
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
}

impl GemmGeometry {
    /// Derive M, N, K and leading dimensions for `op(X) @ op(Y)` on each
    /// sequence pair.
    ///
    /// Fails if the contraction dimensions of the two operands disagree.
    pub fn derive(
        x: &SequenceDescriptor,
        y: &SequenceDescriptor,
        transpose_x: bool,
        transpose_y: bool,
    ) -> Result<Self> {
        let (m, x_k) = if transpose_x {
            (x.inner_size, x.batch_size)
        } else {
            (x.batch_size, x.inner_size)
        };
        let (n, y_k) = if transpose_y {
            (y.batch_size, y.inner_size)
        } else {
            (y.inner_size, y.batch_size)
        };
        if x_k != y_k {
            return Err(ShapeError::ContractionMismatch { x_k, y_k }.into());
        }
        let k = x_k;

        Ok(GemmGeometry {
            trans_a: Transpose::from_flag(transpose_x),
            trans_b: Transpose::from_flag(transpose_y),
            m,
            n,
            k,
            lda: if transpose_x { m } else { k },
            ldb: if transpose_y { k } else { n },
            ldc: n,
        })
    }

    /// Elements in one sequence's output block.
    pub fn out_stride(&self) -> usize {
        self.m * self.n
    }

    /// The batched launch for `batch_count` sequences whose pointer arrays
    /// start at `a_array`, `b_array` and `c_array`. Output is overwritten.
    pub fn batched(
        &self,
        alpha: f32,
        a_array: DevicePtr,
        b_array: DevicePtr,
        c_array: DevicePtr,
        batch_count: usize,
    ) -> BatchedGemm {
        BatchedGemm {
            trans_a: self.trans_a,
            trans_b: self.trans_b,
            m: self.m,
            n: self.n,
            k: self.k,
            alpha,
            a_array,
            lda: self.lda,
            b_array,
            ldb: self.ldb,
            beta: 0.0,
            c_array,
            ldc: self.ldc,
            batch_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;

    fn desc(batch_size: usize, inner_size: usize) -> SequenceDescriptor {
        SequenceDescriptor {
            sequence_count: 2,
            batch_size,
            inner_size,
        }
    }

    #[test]
    fn test_no_transpose() {
        // X blocks 3x4, Y blocks 4x3.
        let g = GemmGeometry::derive(&desc(3, 4), &desc(4, 3), false, false).unwrap();
        assert_eq!((g.m, g.n, g.k), (3, 3, 4));
        assert_eq!((g.lda, g.ldb, g.ldc), (4, 3, 3));
        assert_eq!(g.out_stride(), 9);
    }

    #[test]
    fn test_transpose_x() {
        // X blocks 3x5 used as 5x3; Y blocks 3x2.
        let g = GemmGeometry::derive(&desc(3, 5), &desc(3, 2), true, false).unwrap();
        assert_eq!((g.m, g.n, g.k), (5, 2, 3));
        assert_eq!((g.lda, g.ldb, g.ldc), (5, 2, 2));
        assert!(g.trans_a.is_trans());
    }

    #[test]
    fn test_transpose_y() {
        // X blocks 3x4; Y blocks 2x4 used as 4x2.
        let g = GemmGeometry::derive(&desc(3, 4), &desc(2, 4), false, true).unwrap();
        assert_eq!((g.m, g.n, g.k), (3, 2, 4));
        assert_eq!((g.lda, g.ldb, g.ldc), (4, 4, 2));
    }

    #[test]
    fn test_transpose_both() {
        // X blocks 4x3 -> 3x4; Y blocks 2x4 -> 4x2.
        let g = GemmGeometry::derive(&desc(4, 3), &desc(2, 4), true, true).unwrap();
        assert_eq!((g.m, g.n, g.k), (3, 2, 4));
        assert_eq!((g.lda, g.ldb, g.ldc), (3, 4, 2));
    }

    #[test]
    fn test_contraction_mismatch_all_flags() {
        for tx in [false, true] {
            for ty in [false, true] {
                // Every pairing of 3x4 against 5x6 disagrees on K.
                let err = GemmGeometry::derive(&desc(3, 4), &desc(5, 6), tx, ty).unwrap_err();
                assert!(matches!(
                    err,
                    KernelError::Shape(ShapeError::ContractionMismatch { .. })
                ));
            }
        }
    }

    #[test]
    fn test_batched_fixes_beta_at_zero() {
        let g = GemmGeometry::derive(&desc(3, 4), &desc(4, 3), false, false).unwrap();
        let gemm = g.batched(2.5, DevicePtr::new(8), DevicePtr::new(16), DevicePtr::new(24), 7);
        assert_eq!(gemm.alpha, 2.5);
        assert_eq!(gemm.beta, 0.0);
        assert_eq!(gemm.batch_count, 7);
        assert_eq!(gemm.b_array, DevicePtr::new(16));
    }
}
