//! ONNX super-resolution models via `tract`.
//!
//! Only compiled with the `onnx` feature. The model is loaded once, pinned
//! to a fixed `1 × 3 × H × W` input, optimized, and then run once per frame.

use std::path::Path;

use tract_onnx::prelude::*;

use crate::error::UpscaleError;
use crate::inference::InferenceProvider;
use crate::tensor::{Tensor, TensorShape};

/// [`InferenceProvider`] backed by an ONNX model file.
pub struct OnnxProvider {
    model: TypedRunnableModel<TypedModel>,
    input_shape: TensorShape,
    output_shape: TensorShape,
    name: String,
}

impl OnnxProvider {
    /// Load the model at `model_path` with a fixed `height × width` RGB input.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::ModelUnavailable`] when the file cannot be
    /// parsed, optimized, or does not produce a single fixed-shape 4-D
    /// output.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        height: usize,
        width: usize,
    ) -> Result<Self, UpscaleError> {
        let model_path = model_path.as_ref();
        let unavailable = |stage: &str, error: TractError| {
            UpscaleError::ModelUnavailable(format!(
                "{stage} {}: {error}",
                model_path.display()
            ))
        };

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|error| unavailable("failed to load", error))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
            )
            .map_err(|error| unavailable("failed to pin input shape of", error))?
            .into_optimized()
            .map_err(|error| unavailable("failed to optimize", error))?
            .into_runnable()
            .map_err(|error| unavailable("failed to prepare", error))?;

        let output_dims = model
            .model()
            .output_fact(0)
            .map_err(|error| unavailable("no output in", error))?
            .shape
            .as_concrete()
            .map(<[usize]>::to_vec)
            .ok_or_else(|| {
                UpscaleError::ModelUnavailable(format!(
                    "output shape of {} is not fixed",
                    model_path.display()
                ))
            })?;
        let [batch, channels, out_height, out_width] = output_dims[..] else {
            return Err(UpscaleError::ModelUnavailable(format!(
                "expected a 4-D output from {}, got {output_dims:?}",
                model_path.display()
            )));
        };

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());
        let input_shape = TensorShape::image(3, height, width);
        let output_shape = TensorShape {
            batch,
            channels,
            height: out_height,
            width: out_width,
        };
        log::info!("Loaded ONNX model {name}: {input_shape} -> {output_shape}");

        Ok(Self {
            model,
            input_shape,
            output_shape,
            name,
        })
    }
}

impl InferenceProvider for OnnxProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> TensorShape {
        self.input_shape
    }

    fn output_shape(&self) -> TensorShape {
        self.output_shape
    }

    fn infer(&mut self, input: &Tensor) -> Result<Tensor, UpscaleError> {
        let shape = input.shape();
        let values: Vec<f32> = input.iter().copied().collect();
        let input = tract_onnx::prelude::Tensor::from_shape(
            &[shape.batch, shape.channels, shape.height, shape.width],
            &values,
        )
        .map_err(|error| UpscaleError::InferError(error.to_string()))?;

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|error| UpscaleError::InferError(format!("ONNX inference failed: {error}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| UpscaleError::InferError("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|error| UpscaleError::InferError(format!("output is not f32: {error}")))?;

        Tensor::from_shape_vec(self.output_shape, view.iter().copied().collect())
            .map_err(|error| UpscaleError::InferError(error.to_string()))
    }
}
