pub mod search_aligned_mat_mul;

pub use search_aligned_mat_mul::SearchAlignedMatMulKernel;
