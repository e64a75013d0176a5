use std::collections::BTreeMap;

use super::DevicePtr;
use crate::error::{Result, TensorError};

/// First address handed out by a device arena.
const BASE_ADDRESS: u64 = 0x7f00_0000_0000;
/// Allocation granularity. Every allocation is followed by at least one
/// unmapped granule so that a one-past-the-end address never resolves into
/// the next allocation.
const GRANULE: u64 = 256;

/// Storage for a single device allocation.
#[derive(Debug)]
pub enum Allocation {
    F32(Vec<f32>),
    Ptr(Vec<DevicePtr>),
}

impl Allocation {
    fn len(&self) -> usize {
        match self {
            Allocation::F32(v) => v.len(),
            Allocation::Ptr(v) => v.len(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Allocation::F32(_) => f32::KIND,
            Allocation::Ptr(_) => DevicePtr::KIND,
        }
    }

    fn size_in_bytes(&self) -> usize {
        match self {
            Allocation::F32(v) => v.len() * f32::SIZE,
            Allocation::Ptr(v) => v.len() * DevicePtr::SIZE,
        }
    }
}

/// Element types that can live in device memory.
pub trait DeviceElement: Copy + Default + Send + Sync + 'static {
    /// Human-readable element kind, used in error messages.
    const KIND: &'static str;
    /// Size of one element in device memory.
    const SIZE: usize;

    fn wrap(data: Vec<Self>) -> Allocation;
    fn view(alloc: &Allocation) -> Option<&[Self]>;
    fn view_mut(alloc: &mut Allocation) -> Option<&mut [Self]>;
}

impl DeviceElement for f32 {
    const KIND: &'static str = "f32";
    const SIZE: usize = 4;

    fn wrap(data: Vec<Self>) -> Allocation {
        Allocation::F32(data)
    }

    fn view(alloc: &Allocation) -> Option<&[Self]> {
        match alloc {
            Allocation::F32(v) => Some(v),
            _ => None,
        }
    }

    fn view_mut(alloc: &mut Allocation) -> Option<&mut [Self]> {
        match alloc {
            Allocation::F32(v) => Some(v),
            _ => None,
        }
    }
}

impl DeviceElement for DevicePtr {
    const KIND: &'static str = "pointer";
    const SIZE: usize = 8;

    fn wrap(data: Vec<Self>) -> Allocation {
        Allocation::Ptr(data)
    }

    fn view(alloc: &Allocation) -> Option<&[Self]> {
        match alloc {
            Allocation::Ptr(v) => Some(v),
            _ => None,
        }
    }

    fn view_mut(alloc: &mut Allocation) -> Option<&mut [Self]> {
        match alloc {
            Allocation::Ptr(v) => Some(v),
            _ => None,
        }
    }
}

/// Address space of one simulated accelerator.
///
/// Allocations are keyed by base address. Addresses are handed out
/// monotonically and never reused, so a pointer into freed memory fails to
/// resolve instead of aliasing a newer allocation.
#[derive(Debug)]
pub struct DeviceMemory {
    allocations: BTreeMap<u64, Allocation>,
    next_addr: u64,
    used_bytes: usize,
    capacity_bytes: Option<usize>,
}

impl DeviceMemory {
    pub(crate) fn new(capacity_bytes: Option<usize>) -> Self {
        DeviceMemory {
            allocations: BTreeMap::new(),
            next_addr: BASE_ADDRESS,
            used_bytes: 0,
            capacity_bytes,
        }
    }

    /// Bytes currently allocated.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    pub(crate) fn alloc<T: DeviceElement>(&mut self, data: Vec<T>) -> Result<DevicePtr> {
        let bytes = data.len() * T::SIZE;
        if let Some(capacity) = self.capacity_bytes {
            let available = capacity.saturating_sub(self.used_bytes);
            if bytes > available {
                return Err(TensorError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }

        let addr = self.next_addr;
        let granules = (bytes as u64).div_ceil(GRANULE) + 1;
        self.next_addr += granules * GRANULE;
        self.used_bytes += bytes;
        self.allocations.insert(addr, T::wrap(data));
        Ok(DevicePtr::new(addr))
    }

    pub(crate) fn free(&mut self, ptr: DevicePtr) -> Result<()> {
        let alloc = self
            .allocations
            .remove(&ptr.addr())
            .ok_or(TensorError::InvalidAddress(ptr.addr()))?;
        self.used_bytes -= alloc.size_in_bytes();
        Ok(())
    }

    /// Locate the allocation containing `ptr` and the element index `ptr`
    /// points at, checking that `len` elements starting there stay inside it.
    fn locate<T: DeviceElement>(&self, ptr: DevicePtr, len: usize) -> Result<(u64, usize)> {
        let addr = ptr.addr();
        let (&base, alloc) = self
            .allocations
            .range(..=addr)
            .next_back()
            .ok_or(TensorError::InvalidAddress(addr))?;

        if alloc.kind() != T::KIND {
            return Err(TensorError::DTypeMismatch {
                expected: T::KIND.to_string(),
                got: alloc.kind().to_string(),
            });
        }

        let offset = (addr - base) as usize;
        if offset % T::SIZE != 0 || offset / T::SIZE > alloc.len() {
            return Err(TensorError::InvalidAddress(addr));
        }
        let index = offset / T::SIZE;
        if index + len > alloc.len() {
            return Err(TensorError::OutOfBounds {
                addr,
                len,
                capacity: alloc.len(),
            });
        }
        Ok((base, index))
    }

    /// Borrow `len` elements starting at `ptr`.
    pub fn read<T: DeviceElement>(&self, ptr: DevicePtr, len: usize) -> Result<&[T]> {
        let (base, index) = self.locate::<T>(ptr, len)?;
        let data = self
            .allocations
            .get(&base)
            .and_then(T::view)
            .ok_or(TensorError::InvalidAddress(ptr.addr()))?;
        Ok(&data[index..index + len])
    }

    /// Mutably borrow `len` elements starting at `ptr`.
    pub fn write<T: DeviceElement>(&mut self, ptr: DevicePtr, len: usize) -> Result<&mut [T]> {
        let (base, index) = self.locate::<T>(ptr, len)?;
        let data = self
            .allocations
            .get_mut(&base)
            .and_then(T::view_mut)
            .ok_or(TensorError::InvalidAddress(ptr.addr()))?;
        Ok(&mut data[index..index + len])
    }
}
