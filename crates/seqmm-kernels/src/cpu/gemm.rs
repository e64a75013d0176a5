use crate::backend::BatchedGemm;

/// Single row-major SGEMM on host slices, using the geometry, scalars and
/// leading dimensions of `gemm`.
///
/// `a`, `b` and `c` must span at least the extents reported by
/// [`BatchedGemm::extents`].
pub fn sgemm(gemm: &BatchedGemm, a: &[f32], b: &[f32], c: &mut [f32]) {
    let trans_a = gemm.trans_a.is_trans();
    let trans_b = gemm.trans_b.is_trans();

    for i in 0..gemm.m {
        for j in 0..gemm.n {
            let mut sum = 0.0f32;
            for p in 0..gemm.k {
                let av = if trans_a {
                    a[p * gemm.lda + i]
                } else {
                    a[i * gemm.lda + p]
                };
                let bv = if trans_b {
                    b[j * gemm.ldb + p]
                } else {
                    b[p * gemm.ldb + j]
                };
                sum += av * bv;
            }
            let out = &mut c[i * gemm.ldc + j];
            // beta == 0 overwrites, so stale NaNs in C never leak through.
            *out = if gemm.beta == 0.0 {
                gemm.alpha * sum
            } else {
                gemm.alpha * sum + gemm.beta * *out
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Transpose;
    use seqmm_tensor::DevicePtr;

    fn gemm(m: usize, n: usize, k: usize, trans_a: bool, trans_b: bool) -> BatchedGemm {
        BatchedGemm {
            trans_a: Transpose::from_flag(trans_a),
            trans_b: Transpose::from_flag(trans_b),
            m,
            n,
            k,
            alpha: 1.0,
            a_array: DevicePtr::null(),
            lda: if trans_a { m } else { k },
            b_array: DevicePtr::null(),
            ldb: if trans_b { k } else { n },
            beta: 0.0,
            c_array: DevicePtr::null(),
            ldc: n,
            batch_count: 1,
        }
    }

    #[test]
    fn test_sgemm_identity() {
        let g = gemm(2, 2, 2, false, false);
        let a = [1.0, 0.0, 0.0, 1.0];
        let b = [1.0, 2.0, 3.0, 4.0];
        let mut c = [0.0; 4];
        sgemm(&g, &a, &b, &mut c);
        assert_eq!(c, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sgemm_basic() {
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let g = gemm(2, 2, 2, false, false);
        let mut c = [0.0; 4];
        sgemm(&g, &[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0], &mut c);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_sgemm_transposed_operands() {
        // A stored as [1,3;2,4] (A^T), B stored as [5,7;6,8] (B^T).
        let g = gemm(2, 2, 2, true, true);
        let mut c = [0.0; 4];
        sgemm(&g, &[1.0, 3.0, 2.0, 4.0], &[5.0, 7.0, 6.0, 8.0], &mut c);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_sgemm_beta_zero_ignores_nan() {
        let g = gemm(1, 1, 2, false, false);
        let mut c = [f32::NAN];
        sgemm(&g, &[1.0, 2.0], &[3.0, 4.0], &mut c);
        assert_eq!(c, [11.0]);
    }

    #[test]
    fn test_sgemm_beta_accumulates() {
        let mut g = gemm(1, 1, 2, false, false);
        g.alpha = 2.0;
        g.beta = 1.0;
        let mut c = [1.0];
        sgemm(&g, &[1.0, 2.0], &[3.0, 4.0], &mut c);
        assert_eq!(c, [23.0]);
    }

    #[test]
    fn test_sgemm_rectangular() {
        // [1,2,3] (1x3) @ [[1],[2],[3]] (3x1) = [14]
        let g = gemm(1, 1, 3, false, false);
        let mut c = [0.0];
        sgemm(&g, &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], &mut c);
        assert_eq!(c, [14.0]);
    }
}
