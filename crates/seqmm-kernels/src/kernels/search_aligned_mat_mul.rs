use seqmm_tensor::{Lod, Shape, TensorError};

use crate::address_table::AddressTable;
use crate::config::KernelConfig;
use crate::context::AcceleratorContext;
use crate::error::{ConfigError, KernelError, ResourceError, Result, ShapeError};
use crate::geometry::GemmGeometry;
use crate::kernel::Kernel;
use crate::param::MatMulParam;
use crate::sequence::{SequenceDescriptor, SequenceView};

/// Operator name this kernel is registered under.
pub const OP_TYPE: &str = "search_aligned_mat_mul";

/// Multiplies the i-th sequence of `X` with the i-th sequence of `Y` for
/// every sequence of two aligned, sequence-packed inputs, in a single
/// pointer-array batched launch.
///
/// For `n` sequences, `X` sequences of `bx x kx` and `Y` sequences of
/// `by x ky`, output sequence `i` is `alpha * op(X_i) @ op(Y_i)` and the
/// output tensor is `[n * M, N]` with one `M`-row sequence per input pair.
#[derive(Debug, Default)]
pub struct SearchAlignedMatMulKernel {
    config: KernelConfig,
    ctx: Option<AcceleratorContext>,
    table: AddressTable,
}

impl SearchAlignedMatMulKernel {
    /// A kernel with the default configuration and no context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A kernel with `config` and no context.
    pub fn with_config(config: KernelConfig) -> Self {
        SearchAlignedMatMulKernel {
            config,
            ..Self::default()
        }
    }

    /// The configuration this kernel was built with.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The per-instance pointer tables.
    pub fn table(&self) -> &AddressTable {
        &self.table
    }

    /// Free the pointer tables. The next run reallocates them.
    pub fn release(&mut self) {
        self.table.release();
    }

    fn check_aligned(&self, operand: &'static str, lod: Option<&Lod>) -> Result<()> {
        if self.config.validate_alignment && !lod.is_some_and(Lod::is_aligned) {
            return Err(ShapeError::Unaligned { operand }.into());
        }
        Ok(())
    }
}

impl Kernel for SearchAlignedMatMulKernel {
    type Param = MatMulParam;

    fn name(&self) -> &str {
        OP_TYPE
    }

    fn set_context(&mut self, ctx: AcceleratorContext) {
        let same = self.ctx.as_ref().is_some_and(|old| {
            old.device().same_device(ctx.device()) && old.stream().id() == ctx.stream().id()
        });
        if !same {
            // The tables are bound to the old context's stream.
            self.table.release();
        }
        self.ctx = Some(ctx);
    }

    fn context(&self) -> Option<&AcceleratorContext> {
        self.ctx.as_ref()
    }

    fn prepare_for_run(&mut self, param: &MatMulParam) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(ConfigError::MissingContext)?;
        let sequences = param
            .x
            .lod()
            .map_or(0, Lod::sequence_count)
            .max(self.config.reserve_sequences);
        if sequences == 0 {
            // Nothing to size yet; run() allocates on first use.
            return Ok(());
        }
        self.table.prepare(ctx.device(), ctx.stream(), sequences)
    }

    fn run(&mut self, param: &mut MatMulParam) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(ConfigError::MissingContext)?;
        let blas = ctx.blas().ok_or(ConfigError::MissingBlas)?;

        let x = SequenceDescriptor::read("X", &param.x)?;
        let y = SequenceDescriptor::read("Y", &param.y)?;
        self.check_aligned("X", param.x.lod())?;
        self.check_aligned("Y", param.y.lod())?;
        if x.sequence_count != y.sequence_count {
            return Err(ShapeError::SequenceCountMismatch {
                x: x.sequence_count,
                y: y.sequence_count,
            }
            .into());
        }
        let geometry = GemmGeometry::derive(&x, &y, param.transpose_x, param.transpose_y)?;
        let n = x.sequence_count;

        log::debug!(
            "{}: n={} M={} N={} K={} trans=({:?}, {:?}) alpha={}",
            OP_TYPE,
            n,
            geometry.m,
            geometry.n,
            geometry.k,
            geometry.trans_a,
            geometry.trans_b,
            param.alpha
        );

        // Both inputs must hold n full sequences before the output is touched.
        let x_view = SequenceView::new(
            param.x.data_ptr()?,
            param.x.numel(),
            x.per_sequence_elements(),
            n,
        )?;
        let y_view = SequenceView::new(
            param.y.data_ptr()?,
            param.y.numel(),
            y.per_sequence_elements(),
            n,
        )?;
        let out_lod = Lod::aligned(n, geometry.m)?;

        let out_ptr = param
            .out
            .mutable_data(
                ctx.device(),
                ctx.stream(),
                Shape::new(vec![n * geometry.m, geometry.n]),
            )
            .map_err(|e| match e {
                TensorError::OutOfMemory { .. } => {
                    KernelError::from(ResourceError::DeviceAllocation(e))
                }
                other => other.into(),
            })?;
        param.out.set_lod(Some(out_lod));
        let out_view = SequenceView::new(out_ptr, param.out.numel(), geometry.out_stride(), n)?;

        self.table.ensure_capacity(ctx.device(), ctx.stream(), n)?;
        self.table.fill(&x_view, &y_view, &out_view)?;
        self.table.upload(ctx.stream())?;

        let gemm = geometry.batched(
            param.alpha,
            self.table.a_array()?,
            self.table.b_array()?,
            self.table.c_array()?,
            n,
        );
        blas.sgemm_batched(ctx.stream(), &gemm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use seqmm_tensor::{Device, DeviceTensor, Tensor};

    fn packed(device: &Device, data: Vec<f32>, n: usize, rows: usize, cols: usize) -> DeviceTensor {
        let host = Tensor::new(data, Shape::new(vec![n * rows, cols]))
            .with_lod(Lod::aligned(n, rows).unwrap())
            .unwrap();
        DeviceTensor::from_host(&host, device).unwrap()
    }

    #[test]
    fn test_run_requires_context() {
        let mut kernel = SearchAlignedMatMulKernel::new();
        let mut param = MatMulParam::default();
        assert_eq!(
            kernel.run(&mut param),
            Err(KernelError::Configuration(ConfigError::MissingContext))
        );
        assert_eq!(
            kernel.prepare_for_run(&param),
            Err(KernelError::Configuration(ConfigError::MissingContext))
        );
    }

    #[test]
    fn test_run_requires_blas() {
        let device = Device::new();
        let mut kernel = SearchAlignedMatMulKernel::new();
        kernel.set_context(AcceleratorContext::new(device.clone(), device.create_stream()));
        let mut param = MatMulParam::new(
            packed(&device, vec![1.0; 4], 1, 2, 2),
            packed(&device, vec![1.0; 4], 1, 2, 2),
        );
        assert_eq!(
            kernel.run(&mut param),
            Err(KernelError::Configuration(ConfigError::MissingBlas))
        );
    }

    #[test]
    fn test_prepare_sizes_table() {
        let device = Device::new();
        let mut kernel =
            SearchAlignedMatMulKernel::with_config(KernelConfig::default().with_reserve_sequences(4));
        kernel.set_context(AcceleratorContext::host(&device));
        let param = MatMulParam::new(
            packed(&device, vec![0.0; 12], 2, 3, 2),
            packed(&device, vec![0.0; 12], 2, 2, 3),
        );
        kernel.prepare_for_run(&param).unwrap();
        assert_eq!(kernel.table().capacity(), 4);
    }

    #[test]
    fn test_prepare_without_inputs_defers() {
        let device = Device::new();
        let mut kernel = SearchAlignedMatMulKernel::new();
        kernel.set_context(AcceleratorContext::host(&device));
        kernel.prepare_for_run(&MatMulParam::default()).unwrap();
        assert!(!kernel.table().is_prepared());
    }

    #[test]
    fn test_output_shape_and_lod() {
        let device = Device::new();
        let mut kernel = SearchAlignedMatMulKernel::new();
        kernel.set_context(AcceleratorContext::host(&device));
        // X sequences 2x3, Y sequences 3x5.
        let mut param = MatMulParam::new(
            packed(&device, vec![1.0; 12], 2, 2, 3),
            packed(&device, vec![1.0; 30], 2, 3, 5),
        );
        kernel.prepare_for_run(&param).unwrap();
        kernel.run(&mut param).unwrap();
        kernel.context().unwrap().stream().synchronize().unwrap();

        assert_eq!(param.out.shape().dims(), &[4, 5]);
        assert_eq!(param.out.lod().unwrap().offsets(), &[0, 2, 4]);
        let out = param.out.to_host().unwrap();
        assert!(out.data_f32().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_release_then_run_reallocates() {
        let device = Device::new();
        let mut kernel = SearchAlignedMatMulKernel::new();
        kernel.set_context(AcceleratorContext::host(&device));
        let mut param = MatMulParam::new(
            packed(&device, vec![1.0; 4], 1, 2, 2),
            packed(&device, vec![1.0; 4], 1, 2, 2),
        );
        kernel.run(&mut param).unwrap();
        kernel.release();
        kernel.release();
        assert!(!kernel.table().is_prepared());
        kernel.run(&mut param).unwrap();
        kernel.context().unwrap().stream().synchronize().unwrap();
        assert!(kernel.table().is_prepared());
    }

    #[test]
    fn test_short_input_leaves_output_untouched() {
        let device = Device::new();
        let mut kernel = SearchAlignedMatMulKernel::with_config(
            KernelConfig::default().with_validate_alignment(false),
        );
        kernel.set_context(AcceleratorContext::host(&device));
        // Sequences of 3 and 1 rows: the reader takes 3 rows per sequence,
        // so X would need 6 rows but holds 4.
        let x = Tensor::new(vec![1.0; 8], Shape::new(vec![4, 2]))
            .with_lod(Lod::new(vec![0, 3, 4]).unwrap())
            .unwrap();
        let mut param = MatMulParam::new(
            DeviceTensor::from_host(&x, &device).unwrap(),
            packed(&device, vec![1.0; 12], 2, 3, 2),
        )
        .with_transpose(true, false);

        assert!(matches!(
            kernel.run(&mut param),
            Err(KernelError::Shape(ShapeError::SequenceOutOfBounds { .. }))
        ));
        assert!(!param.out.is_allocated());
        assert!(param.out.lod().is_none());
        assert!(!kernel.table().is_prepared());
    }

    #[test]
    fn test_context_change_releases_table() {
        let device = Device::new();
        let mut kernel = SearchAlignedMatMulKernel::new();
        kernel.set_context(AcceleratorContext::host(&device));
        let mut param = MatMulParam::new(
            packed(&device, vec![1.0; 4], 1, 2, 2),
            packed(&device, vec![1.0; 4], 1, 2, 2),
        );
        kernel.run(&mut param).unwrap();
        kernel.context().unwrap().stream().synchronize().unwrap();
        let ctx = kernel.context().unwrap().clone();
        kernel.set_context(ctx);
        assert!(kernel.table().is_prepared());

        kernel.set_context(AcceleratorContext::host(&device));
        assert!(!kernel.table().is_prepared());
        kernel.run(&mut param).unwrap();
        kernel.context().unwrap().stream().synchronize().unwrap();
        assert!(kernel.table().is_prepared());
    }
}
