//! Fixed-rank `f32` tensors exchanged with the inference provider.
//!
//! Tensors are always rank 4 in NCHW order (batch, channels, height, width)
//! and backed by an [`ndarray::Array4`].

use std::collections::TryReserveError;
use std::fmt::{Display, Formatter, Result as FmtResult};

use ndarray::{Array4, ArrayView4, ShapeError};

/// Shape of an NCHW tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    /// Batch size. The pipeline always uses 1.
    pub batch: usize,
    /// Channel count (3 for RGB models).
    pub channels: usize,
    /// Spatial height.
    pub height: usize,
    /// Spatial width.
    pub width: usize,
}

impl TensorShape {
    /// A single-image shape `1 × channels × height × width`.
    pub const fn image(channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch: 1,
            channels,
            height,
            width,
        }
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// `true` if any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same shape with both spatial dimensions multiplied by `factor`.
    pub fn scaled(&self, factor: usize) -> Self {
        Self {
            height: self.height * factor,
            width: self.width * factor,
            ..*self
        }
    }

    fn dims(&self) -> (usize, usize, usize, usize) {
        (self.batch, self.channels, self.height, self.width)
    }
}

impl Display for TensorShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}x{}x{}x{}",
            self.batch, self.channels, self.height, self.width
        )
    }
}

/// A rank-4 `f32` tensor in NCHW order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array4<f32>,
}

impl Tensor {
    /// A tensor of the given shape filled with zeros.
    pub fn zeros(shape: TensorShape) -> Self {
        Self {
            data: Array4::zeros(shape.dims()),
        }
    }

    /// A tensor whose element at `(n, c, y, x)` is `f(n, c, y, x)`.
    pub fn from_fn<F>(shape: TensorShape, f: F) -> Self
    where
        F: FnMut((usize, usize, usize, usize)) -> f32,
    {
        Self {
            data: Array4::from_shape_fn(shape.dims(), f),
        }
    }

    /// Wrap a flat, channel-major buffer.
    pub fn from_shape_vec(shape: TensorShape, values: Vec<f32>) -> Result<Self, ShapeError> {
        Ok(Self {
            data: Array4::from_shape_vec(shape.dims(), values)?,
        })
    }

    /// Reserve a flat buffer for `shape` without aborting on allocation
    /// failure. The returned vector is empty with enough capacity.
    pub(crate) fn try_buffer(shape: TensorShape) -> Result<Vec<f32>, TryReserveError> {
        let mut values = Vec::new();
        values.try_reserve_exact(shape.len())?;
        Ok(values)
    }

    /// The tensor's shape.
    pub fn shape(&self) -> TensorShape {
        let (batch, channels, height, width) = self.data.dim();
        TensorShape {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Read-only view of the elements.
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Elements in logical (channel-major) order.
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.data.iter()
    }
}
