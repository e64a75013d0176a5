/// Tunables for the aligned batched-multiply kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Reject operands whose sequences differ in length before any device
    /// work is enqueued. When off, unaligned inputs are treated as if every
    /// sequence had the length of the first one.
    pub validate_alignment: bool,
    /// Minimum number of sequences the address tables are sized for at
    /// preparation time.
    pub reserve_sequences: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            validate_alignment: true,
            reserve_sequences: 0,
        }
    }
}

impl KernelConfig {
    /// Turn the per-run alignment check on or off.
    pub fn with_validate_alignment(mut self, validate: bool) -> Self {
        self.validate_alignment = validate;
        self
    }

    /// Size the pointer tables for at least `sequences` in `prepare_for_run`.
    pub fn with_reserve_sequences(mut self, sequences: usize) -> Self {
        self.reserve_sequences = sequences;
        self
    }
}
