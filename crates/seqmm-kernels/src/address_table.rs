use seqmm_tensor::{Device, DeviceBuffer, DevicePtr, Stream};

use crate::error::{ConfigError, Result, ResourceError, ShapeError};
use crate::sequence::SequenceView;

/// Pointer arrays consumed by a pointer-array batched multiply.
///
/// For `n` sequences the table holds `3 * n` device addresses laid out as
/// `[A_0 .. A_{n-1}][B_0 .. B_{n-1}][C_0 .. C_{n-1}]`. The host copy is
/// refilled on every run and uploaded to the device copy on the kernel's
/// stream; the multiply then reads the three sub-arrays at offsets `0`, `n`
/// and `2n`.
///
/// Both copies are sized in whole sequences. They grow when a run needs more
/// sequences than the current capacity and never shrink until released.
#[derive(Debug, Default)]
pub struct AddressTable {
    host: Vec<DevicePtr>,
    device: Option<DeviceBuffer<DevicePtr>>,
    capacity: usize,
    len: usize,
}

impl AddressTable {
    /// Empty tables; nothing is allocated until [`prepare`](Self::prepare).
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate host and device tables for `sequence_count` sequences.
    ///
    /// Existing tables that are already large enough are kept.
    pub fn prepare(&mut self, device: &Device, stream: &Stream, sequence_count: usize) -> Result<()> {
        self.ensure_capacity(device, stream, sequence_count)?;
        Ok(())
    }

    /// Grow both tables to hold at least `sequence_count` sequences.
    ///
    /// Returns `true` if the tables were reallocated. The device table is
    /// bound to `stream`, so a replaced table is freed behind the work already
    /// queued there without waiting on the device's other streams.
    pub fn ensure_capacity(
        &mut self,
        device: &Device,
        stream: &Stream,
        sequence_count: usize,
    ) -> Result<bool> {
        if self.device.is_some() && sequence_count <= self.capacity {
            return Ok(false);
        }
        let capacity = sequence_count.max(self.capacity);
        let entries = 3 * capacity;

        let mut host = Vec::new();
        host.try_reserve_exact(entries)
            .map_err(|_| ResourceError::HostAllocation {
                bytes: entries * std::mem::size_of::<DevicePtr>(),
            })?;
        host.resize(entries, DevicePtr::null());

        // The old table's free is queued on its stream; on a tight device the
        // new allocation can fail until that stream drains.
        self.device = None;
        self.capacity = 0;
        self.len = 0;
        let mut table = device
            .alloc::<DevicePtr>(entries)
            .map_err(ResourceError::DeviceAllocation)?;
        table.bind_stream(stream)?;

        log::debug!(
            "address table: grown to {} sequences ({} entries)",
            capacity,
            entries
        );
        self.host = host;
        self.device = Some(table);
        self.capacity = capacity;
        Ok(true)
    }

    /// Number of sequences the tables can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sequences written by the last [`fill`](Self::fill).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the last fill wrote no sequences.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the device table is allocated.
    pub fn is_prepared(&self) -> bool {
        self.device.is_some()
    }

    /// Write the per-sequence addresses of `a`, `b` and `out` into the host
    /// table.
    pub fn fill(&mut self, a: &SequenceView, b: &SequenceView, out: &SequenceView) -> Result<()> {
        let n = a.count();
        if b.count() != n {
            return Err(ShapeError::SequenceCountMismatch {
                x: n,
                y: b.count(),
            }
            .into());
        }
        if out.count() != n {
            return Err(ShapeError::OutputCountMismatch {
                inputs: n,
                output: out.count(),
            }
            .into());
        }
        if self.device.is_none() {
            return Err(ConfigError::TableNotPrepared.into());
        }
        if n > self.capacity {
            return Err(ConfigError::TableTooSmall {
                needed: n,
                capacity: self.capacity,
            }
            .into());
        }

        for seq in 0..n {
            self.host[seq] = a.get(seq)?.ptr;
            self.host[seq + n] = b.get(seq)?.ptr;
            self.host[seq + 2 * n] = out.get(seq)?.ptr;
        }
        self.len = n;
        Ok(())
    }

    /// The `3 * len()` entries written by the last fill.
    pub fn host_entries(&self) -> &[DevicePtr] {
        &self.host[..3 * self.len]
    }

    /// Enqueue the copy of the filled host entries into the device table.
    pub fn upload(&self, stream: &Stream) -> Result<()> {
        let table = self.device_table()?;
        stream.memcpy_htod_async(self.host_entries(), table.ptr())?;
        Ok(())
    }

    /// Device address of the A pointer sub-array.
    pub fn a_array(&self) -> Result<DevicePtr> {
        Ok(self.device_table()?.ptr())
    }

    /// Device address of the B pointer sub-array.
    pub fn b_array(&self) -> Result<DevicePtr> {
        Ok(self.device_table()?.ptr().offset::<DevicePtr>(self.len))
    }

    /// Device address of the output pointer sub-array.
    pub fn c_array(&self) -> Result<DevicePtr> {
        Ok(self.device_table()?.ptr().offset::<DevicePtr>(2 * self.len))
    }

    /// Free both tables. Safe to call repeatedly or before `prepare`.
    pub fn release(&mut self) {
        if self.device.take().is_some() {
            log::debug!("address table: released {} sequences", self.capacity);
        }
        self.host = Vec::new();
        self.capacity = 0;
        self.len = 0;
    }

    fn device_table(&self) -> Result<&DeviceBuffer<DevicePtr>> {
        self.device
            .as_ref()
            .ok_or_else(|| ConfigError::TableNotPrepared.into())
    }
}

impl Drop for AddressTable {
    fn drop(&mut self) {
        self.release();
    }
}
