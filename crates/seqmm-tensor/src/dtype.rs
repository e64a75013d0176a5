use std::fmt;

/// Element type of host tensor data.
///
/// Only `F32` can be uploaded to the device; `F16` host data is rejected at
/// the device boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    /// IEEE 754 half precision, stored as `half::f16`.
    F16,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => std::mem::size_of::<f32>(),
            DType::F16 => std::mem::size_of::<half::f16>(),
        }
    }

    /// Whether device kernels accept this element type.
    pub fn is_device_supported(&self) -> bool {
        matches!(self, DType::F32)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
        })
    }
}
