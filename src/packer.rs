//! Frame → model-input tensor conversion.
//!
//! [`TensorPacker`] resamples a [`Frame`] to the provider's fixed spatial
//! resolution, splits its interleaved pixels into planar RGB channels, and
//! normalizes samples to the model's [`SampleRange`]. It holds no state
//! between frames.

use image::RgbImage;
use image::imageops;

use crate::configuration::{ResizeFilter, SampleRange};
use crate::error::UpscaleError;
use crate::frame::{Frame, PixelLayout};
use crate::tensor::{Tensor, TensorShape};

/// Packs frames into NCHW tensors of one fixed shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorPacker {
    shape: TensorShape,
    filter: ResizeFilter,
    range: SampleRange,
}

impl TensorPacker {
    /// A packer producing tensors of `shape` with bilinear resizing and
    /// unit-range samples.
    pub fn new(shape: TensorShape) -> Self {
        Self {
            shape,
            filter: ResizeFilter::default(),
            range: SampleRange::default(),
        }
    }

    /// Set the resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the sample range of the produced tensor.
    #[must_use]
    pub fn with_sample_range(mut self, range: SampleRange) -> Self {
        self.range = range;
        self
    }

    /// Shape of every tensor this packer produces.
    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    /// Convert `frame` into a tensor filled from its pixel content.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::PackError`] if the target shape is not a
    /// single 3-channel image, the frame is empty, or an intermediate buffer
    /// cannot be allocated.
    pub fn pack(&self, frame: &Frame) -> Result<Tensor, UpscaleError> {
        let shape = self.shape;
        if shape.batch != 1 || shape.channels != 3 || shape.is_empty() {
            return Err(UpscaleError::PackError(format!(
                "unsupported model input shape {shape}"
            )));
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(UpscaleError::PackError("frame has no pixels".to_string()));
        }

        let rgb = interleaved_to_rgb(frame)?;
        let (target_width, target_height) = (shape.width as u32, shape.height as u32);
        let rgb = if rgb.dimensions() == (target_width, target_height) {
            rgb
        } else {
            imageops::resize(
                &rgb,
                target_width,
                target_height,
                self.filter.to_filter_type(),
            )
        };

        let scale = 1.0 / self.range.to_byte_scale();
        let mut values = Tensor::try_buffer(shape).map_err(|error| {
            UpscaleError::PackError(format!("cannot allocate {shape} tensor: {error}"))
        })?;
        for channel in 0..3 {
            values.extend(rgb.pixels().map(|pixel| pixel.0[channel] as f32 * scale));
        }

        Tensor::from_shape_vec(shape, values)
            .map_err(|error| UpscaleError::PackError(error.to_string()))
    }
}

/// Reorder an interleaved 32-bit frame into a packed RGB image.
fn interleaved_to_rgb(frame: &Frame) -> Result<RgbImage, UpscaleError> {
    let (width, height) = (frame.width(), frame.height());
    let offsets = frame.layout().channel_offsets();

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(width as usize * height as usize * 3)
        .map_err(|error| {
            UpscaleError::PackError(format!(
                "cannot allocate {width}x{height} RGB buffer: {error}"
            ))
        })?;
    for row in frame.rows() {
        for pixel in row.chunks_exact(PixelLayout::BYTES_PER_PIXEL) {
            buffer.extend_from_slice(&[pixel[offsets.red], pixel[offsets.green], pixel[offsets.blue]]);
        }
    }

    RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        UpscaleError::PackError("pixel buffer shorter than frame dimensions".to_string())
    })
}
