use seqmm_tensor::DeviceTensor;

/// Bindings and attributes of one aligned sequence matmul.
///
/// `x` and `y` are sequence-packed inputs; `out` is resized and given an
/// offset list by the kernel. `alpha` defaults to 1, so a param built with
/// `..Default::default()` computes the plain product.
#[derive(Debug)]
pub struct MatMulParam {
    pub x: DeviceTensor,
    pub y: DeviceTensor,
    pub out: DeviceTensor,
    pub transpose_x: bool,
    pub transpose_y: bool,
    pub alpha: f32,
}

impl Default for MatMulParam {
    fn default() -> Self {
        MatMulParam {
            x: DeviceTensor::empty(),
            y: DeviceTensor::empty(),
            out: DeviceTensor::empty(),
            transpose_x: false,
            transpose_y: false,
            alpha: 1.0,
        }
    }
}

impl MatMulParam {
    /// Bind the two inputs with no transposes and `alpha = 1`.
    pub fn new(x: DeviceTensor, y: DeviceTensor) -> Self {
        MatMulParam {
            x,
            y,
            ..Self::default()
        }
    }

    /// Set whether each input sequence is transposed before the multiply.
    pub fn with_transpose(mut self, transpose_x: bool, transpose_y: bool) -> Self {
        self.transpose_x = transpose_x;
        self.transpose_y = transpose_y;
        self
    }

    /// Scale applied to every product.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Bind an existing output tensor, e.g. to reuse its storage.
    pub fn with_out(mut self, out: DeviceTensor) -> Self {
        self.out = out;
        self
    }
}
