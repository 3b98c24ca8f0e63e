//! Inference providers.
//!
//! The pipeline treats the super-resolution model as an opaque
//! [`InferenceProvider`]: exactly one tensor of a fixed input shape in,
//! exactly one tensor of a fixed output shape out. How the provider is
//! loaded or computes its result is its own business.
//!
//! [`ResampleProvider`] is a deterministic, pure-Rust provider that enlarges
//! tensors by nearest-neighbour replication. It needs no model file, which
//! makes it the CLI's default and a convenient stand-in for tests.

use crate::error::UpscaleError;
use crate::tensor::{Tensor, TensorShape};

/// A fixed-shape tensor-in, tensor-out model.
///
/// Calls are synchronous from the pipeline's perspective: the next call is
/// issued only after the previous one returned.
pub trait InferenceProvider: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Shape every input tensor must have.
    fn input_shape(&self) -> TensorShape;

    /// Shape every output tensor will have.
    fn output_shape(&self) -> TensorShape;

    /// Run the model on one tensor.
    ///
    /// # Errors
    ///
    /// Implementations return [`UpscaleError::InferError`] when the call
    /// fails; the pipeline then applies its failure policy to the frame.
    fn infer(&mut self, input: &Tensor) -> Result<Tensor, UpscaleError>;
}

impl<P: InferenceProvider + ?Sized> InferenceProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn input_shape(&self) -> TensorShape {
        (**self).input_shape()
    }

    fn output_shape(&self) -> TensorShape {
        (**self).output_shape()
    }

    fn infer(&mut self, input: &Tensor) -> Result<Tensor, UpscaleError> {
        (**self).infer(input)
    }
}

/// Nearest-neighbour tensor upscaler with an integer factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleProvider {
    input_shape: TensorShape,
    factor: usize,
}

impl ResampleProvider {
    /// A provider accepting `input_shape` and enlarging it `factor` times.
    ///
    /// A factor of 1 makes the provider an identity transform.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::ModelUnavailable`] for a zero factor or an
    /// empty input shape.
    pub fn new(input_shape: TensorShape, factor: usize) -> Result<Self, UpscaleError> {
        if factor == 0 || input_shape.is_empty() {
            return Err(UpscaleError::ModelUnavailable(format!(
                "cannot resample {input_shape} by a factor of {factor}"
            )));
        }
        Ok(Self {
            input_shape,
            factor,
        })
    }

    /// The spatial magnification factor.
    pub fn factor(&self) -> usize {
        self.factor
    }
}

impl InferenceProvider for ResampleProvider {
    fn name(&self) -> &str {
        "resample"
    }

    fn input_shape(&self) -> TensorShape {
        self.input_shape
    }

    fn output_shape(&self) -> TensorShape {
        self.input_shape.scaled(self.factor)
    }

    fn infer(&mut self, input: &Tensor) -> Result<Tensor, UpscaleError> {
        if input.shape() != self.input_shape {
            return Err(UpscaleError::InferError(format!(
                "expected input {}, got {}",
                self.input_shape,
                input.shape()
            )));
        }
        let factor = self.factor;
        let source = input.view();
        Ok(Tensor::from_fn(self.output_shape(), |(n, c, y, x)| {
            source[[n, c, y / factor, x / factor]]
        }))
    }
}
