//! `seqmm-tensor` - Sequence-packed tensors and a stream-ordered accelerator
//! device model for seqmm.
//!
//! This crate provides:
//! - Host `Tensor`s with an optional `Lod` offset list marking sequence
//!   boundaries along axis 0
//! - A simulated accelerator: typed device memory addressed by `DevicePtr`,
//!   owned `DeviceBuffer`s, and in-order `Stream`s
//! - `DeviceTensor`, the device-resident counterpart used by kernels
//! - Shape utilities and data type definitions

pub mod device;
pub mod dtype;
pub mod error;
pub mod lod;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use device::{Device, DeviceBuffer, DeviceConfig, DevicePtr, DeviceTensor, Stream};
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use lod::Lod;
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;
