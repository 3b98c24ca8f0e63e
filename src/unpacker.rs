//! Model-output tensor → frame conversion.
//!
//! [`TensorUnpacker`] is the only numeric-safety gate in the pipeline:
//! every sample is sanitized (non-finite → 0), scaled to the 8-bit range,
//! rounded and clamped before it reaches a pixel buffer. Alpha is always
//! opaque since models produce colour channels only.

use crate::configuration::SampleRange;
use crate::error::UpscaleError;
use crate::frame::{Frame, PixelLayout};
use crate::tensor::Tensor;

/// Number of leading samples logged at trace level for each tensor.
const TRACE_SAMPLE_COUNT: usize = 10;

/// Converts NCHW output tensors into interleaved 8-bit frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorUnpacker {
    range: SampleRange,
    layout: PixelLayout,
}

impl TensorUnpacker {
    /// An unpacker reading unit-range samples into BGRA frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sample range the model produces.
    #[must_use]
    pub fn with_sample_range(mut self, range: SampleRange) -> Self {
        self.range = range;
        self
    }

    /// Set the layout of produced frames.
    #[must_use]
    pub fn with_layout(mut self, layout: PixelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Convert `tensor` into a frame of the tensor's spatial size.
    ///
    /// Single-channel tensors are replicated into grey; for three or more
    /// channels the first three are read as red, green, blue.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::UnpackError`] for a batch size other than 1,
    /// an unsupported channel count, oversized dimensions, or when the
    /// output buffer cannot be allocated.
    pub fn unpack(&self, tensor: &Tensor) -> Result<Frame, UpscaleError> {
        let shape = tensor.shape();
        if shape.batch != 1 {
            return Err(UpscaleError::UnpackError(format!(
                "expected a batch of 1, got {shape}"
            )));
        }
        if !(shape.channels == 1 || shape.channels >= 3) {
            return Err(UpscaleError::UnpackError(format!(
                "cannot map {} channels to RGB",
                shape.channels
            )));
        }
        let (Ok(width), Ok(height)) = (u32::try_from(shape.width), u32::try_from(shape.height))
        else {
            return Err(UpscaleError::UnpackError(format!(
                "tensor {shape} is too large for a frame"
            )));
        };

        if log::log_enabled!(log::Level::Trace) {
            let head: Vec<f32> = tensor.iter().take(TRACE_SAMPLE_COUNT).copied().collect();
            log::trace!("Output tensor {shape} leading samples: {head:?}");
        }

        let mut frame = Frame::try_zeroed(width, height, self.layout).map_err(|error| {
            UpscaleError::UnpackError(format!(
                "cannot allocate {width}x{height} frame: {error}"
            ))
        })?;

        let view = tensor.view();
        let scale = self.range.to_byte_scale();
        let offsets = self.layout.channel_offsets();
        let grey = shape.channels == 1;

        for (y, row) in frame.rows_mut().enumerate() {
            for (x, pixel) in row.chunks_exact_mut(PixelLayout::BYTES_PER_PIXEL).enumerate() {
                let sample = |channel: usize| sample_to_byte(view[[0, channel, y, x]], scale);
                let red = sample(0);
                let (green, blue) = if grey { (red, red) } else { (sample(1), sample(2)) };
                pixel[offsets.red] = red;
                pixel[offsets.green] = green;
                pixel[offsets.blue] = blue;
                pixel[offsets.alpha] = u8::MAX;
            }
        }

        Ok(frame)
    }
}

/// Map one model sample onto a byte: non-finite values become 0, everything
/// else is scaled, rounded, and saturated into `0..=255`.
pub fn sample_to_byte(value: f32, scale: f32) -> u8 {
    let value = if value.is_finite() { value } else { 0.0 };
    (value * scale).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_samples_map_to_zero() {
        assert_eq!(sample_to_byte(f32::NAN, 255.0), 0);
        assert_eq!(sample_to_byte(f32::INFINITY, 255.0), 0);
        assert_eq!(sample_to_byte(f32::NEG_INFINITY, 255.0), 0);
    }

    #[test]
    fn samples_saturate_and_round() {
        assert_eq!(sample_to_byte(1.0, 255.0), 255);
        assert_eq!(sample_to_byte(2.5, 255.0), 255);
        assert_eq!(sample_to_byte(-0.3, 255.0), 0);
        assert_eq!(sample_to_byte(0.5, 255.0), 128);
        assert_eq!(sample_to_byte(f32::MAX, 255.0), 255);
        assert_eq!(sample_to_byte(127.4, 1.0), 127);
    }
}
