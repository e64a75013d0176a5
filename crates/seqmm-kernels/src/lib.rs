//! `seqmm-kernels` - Batched matrix multiplication over sequence-packed
//! tensors.
//!
//! This crate provides:
//! - `SearchAlignedMatMulKernel`, which multiplies corresponding sequences of
//!   two aligned inputs in one pointer-array batched launch
//! - The `BatchedMultiplyBackend` trait and a reference `HostBlas`
//! - `AddressTable`, the per-kernel host and device pointer tables
//! - A `Kernel` trait and `KernelRegistry` for dispatch by operator key

pub mod address_table;
pub mod backend;
pub mod config;
pub mod context;
pub mod cpu;
pub mod error;
pub mod geometry;
pub mod kernel;
pub mod kernels;
pub mod param;
pub mod registry;
pub mod sequence;

// Re-export primary types at the crate root for convenience.
pub use address_table::AddressTable;
pub use backend::{BatchedGemm, BatchedMultiplyBackend, Transpose};
pub use config::KernelConfig;
pub use context::AcceleratorContext;
pub use cpu::HostBlas;
pub use error::{ConfigError, ErrorKind, KernelError, ResourceError, Result, ShapeError};
pub use geometry::GemmGeometry;
pub use kernel::{DataLayout, Kernel, KernelKey, Precision, Target};
pub use kernels::SearchAlignedMatMulKernel;
pub use param::MatMulParam;
pub use registry::{register_builtin_kernels, KernelRegistration, KernelRegistry};
pub use sequence::{SequenceDescriptor, SequenceView, SubRange};
