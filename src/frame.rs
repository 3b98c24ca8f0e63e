//! Pixel buffers and presentation timing.
//!
//! A [`Frame`] is an owned, interleaved 8-bit-per-channel pixel buffer with
//! an explicit row stride. It moves by value through the pipeline (source →
//! packer, unpacker → sink) and is never shared between stages. Direct byte
//! access goes through [`Frame::row`] / [`Frame::rows`], which hand out
//! bounds-checked row slices instead of base addresses.
//!
//! [`FrameRate`] and [`Timestamp`] carry exact rational timing, so output
//! presentation times never accumulate floating-point drift.

use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

/// Interleaved byte order of a 32-bit pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelLayout {
    /// Blue, green, red, alpha. This is the default decode layout.
    #[default]
    Bgra,
    /// Alpha, red, green, blue.
    Argb,
    /// Red, green, blue, alpha.
    Rgba,
}

/// Byte offsets of each channel inside one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    /// Offset of the red byte.
    pub red: usize,
    /// Offset of the green byte.
    pub green: usize,
    /// Offset of the blue byte.
    pub blue: usize,
    /// Offset of the alpha byte.
    pub alpha: usize,
}

impl PixelLayout {
    /// Every supported layout packs four bytes per pixel.
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Where each channel lives inside a pixel.
    pub fn channel_offsets(self) -> ChannelOffsets {
        match self {
            PixelLayout::Bgra => ChannelOffsets { red: 2, green: 1, blue: 0, alpha: 3 },
            PixelLayout::Argb => ChannelOffsets { red: 1, green: 2, blue: 3, alpha: 0 },
            PixelLayout::Rgba => ChannelOffsets { red: 0, green: 1, blue: 2, alpha: 3 },
        }
    }

    /// Encode an RGBA quadruple into this layout's byte order.
    pub fn encode(self, rgba: [u8; 4]) -> [u8; 4] {
        let offsets = self.channel_offsets();
        let mut pixel = [0u8; 4];
        pixel[offsets.red] = rgba[0];
        pixel[offsets.green] = rgba[1];
        pixel[offsets.blue] = rgba[2];
        pixel[offsets.alpha] = rgba[3];
        pixel
    }

    /// Decode one pixel in this layout into an RGBA quadruple.
    pub fn decode(self, pixel: &[u8]) -> [u8; 4] {
        let offsets = self.channel_offsets();
        [
            pixel[offsets.red],
            pixel[offsets.green],
            pixel[offsets.blue],
            pixel[offsets.alpha],
        ]
    }
}

/// A rectangular, interleaved 8-bit pixel buffer plus an optional
/// presentation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    stride: usize,
    data: Vec<u8>,
    timestamp: Option<Duration>,
}

impl Frame {
    /// Wrap an existing byte buffer.
    ///
    /// Returns `None` when the stride is narrower than a row or the buffer
    /// is too short to hold `height` rows.
    pub fn from_raw(
        width: u32,
        height: u32,
        layout: PixelLayout,
        stride: usize,
        data: Vec<u8>,
    ) -> Option<Self> {
        let row_len = width as usize * PixelLayout::BYTES_PER_PIXEL;
        if stride < row_len {
            return None;
        }
        let required = match height as usize {
            0 => 0,
            rows => stride * (rows - 1) + row_len,
        };
        if data.len() < required {
            return None;
        }
        Some(Self {
            width,
            height,
            layout,
            stride,
            data,
            timestamp: None,
        })
    }

    /// Allocate a zeroed, tightly packed frame, reporting allocation failure
    /// instead of aborting.
    pub(crate) fn try_zeroed(
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self, TryReserveError> {
        let stride = width as usize * PixelLayout::BYTES_PER_PIXEL;
        let len = stride * height as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            layout,
            stride,
            data,
            timestamp: None,
        })
    }

    /// Build a frame where every pixel has the same RGBA colour.
    pub fn filled(width: u32, height: u32, layout: PixelLayout, rgba: [u8; 4]) -> Self {
        let pixel = layout.encode(rgba);
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * PixelLayout::BYTES_PER_PIXEL)
            .collect();
        Self {
            width,
            height,
            layout,
            stride: width as usize * PixelLayout::BYTES_PER_PIXEL,
            data,
            timestamp: None,
        }
    }

    /// Attach a presentation time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Option<Duration>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte order of each pixel.
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Distance in bytes between the starts of two consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Presentation time reported by the source, if any.
    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    /// Number of meaningful bytes in one row (excludes stride padding).
    pub fn row_len(&self) -> usize {
        self.width as usize * PixelLayout::BYTES_PER_PIXEL
    }

    /// The pixel bytes of row `y`, without padding.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_len()]
    }

    /// Iterate over all rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let row_len = self.row_len();
        self.data
            .chunks(self.stride.max(1))
            .take(self.height as usize)
            .map(move |row| &row[..row_len])
    }

    /// Iterate mutably over all rows, top to bottom.
    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        let row_len = self.row_len();
        let height = self.height as usize;
        self.data
            .chunks_mut(self.stride.max(1))
            .take(height)
            .map(move |row| &mut row[..row_len])
    }

    /// RGBA value of the pixel at `(x, y)`, regardless of layout.
    ///
    /// # Panics
    ///
    /// Panics if `x >= width` or `y >= height`.
    pub fn pixel_rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = x as usize * PixelLayout::BYTES_PER_PIXEL;
        self.layout
            .decode(&self.row(y)[offset..offset + PixelLayout::BYTES_PER_PIXEL])
    }

    /// The whole backing buffer, including stride padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A nominal frame rate expressed as an exact rational (frames / second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    numerator: u32,
    denominator: u32,
}

impl FrameRate {
    /// Create a frame rate of `numerator / denominator` frames per second.
    ///
    /// Returns `None` if either part is zero or larger than `i32::MAX`,
    /// the range FFmpeg rationals can hold.
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        const MAX_PART: u32 = i32::MAX as u32;
        if numerator == 0 || denominator == 0 || numerator > MAX_PART || denominator > MAX_PART {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    /// Whole-number frame rate (`fps / 1`).
    pub fn from_integer(fps: u32) -> Option<Self> {
        Self::new(fps, 1)
    }

    /// Numerator of the rate.
    pub fn numerator(self) -> u32 {
        self.numerator
    }

    /// Denominator of the rate.
    pub fn denominator(self) -> u32 {
        self.denominator
    }

    /// Frames per second as a float (for display and estimates only).
    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Presentation timestamp of the `index`-th output frame.
    pub fn timestamp(self, index: u64) -> Timestamp {
        Timestamp {
            ticks: index as i64,
            rate: self,
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self {
            numerator: 30,
            denominator: 1,
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

/// An exact presentation time: `ticks` frame durations at `rate`.
///
/// The time in seconds is `ticks × denominator / numerator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    ticks: i64,
    rate: FrameRate,
}

impl Timestamp {
    /// Number of frame durations since the start of the output.
    pub fn ticks(self) -> i64 {
        self.ticks
    }

    /// The frame rate the ticks are counted in.
    pub fn frame_rate(self) -> FrameRate {
        self.rate
    }

    /// Seconds since the start of the output.
    pub fn as_secs_f64(self) -> f64 {
        self.ticks as f64 * self.rate.denominator as f64 / self.rate.numerator as f64
    }

    /// Time since the start of the output.
    pub fn as_duration(self) -> Duration {
        Duration::from_secs_f64(self.as_secs_f64().max(0.0))
    }

    fn scaled(self, other: FrameRate) -> i128 {
        self.ticks as i128 * self.rate.denominator as i128 * other.numerator as i128
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare a·d/n against b·d'/n' without division.
        self.scaled(other.rate)
            .cmp(&other.scaled(self.rate))
            .then(self.ticks.cmp(&other.ticks))
            .then_with(|| {
                (self.rate.numerator, self.rate.denominator)
                    .cmp(&(other.rate.numerator, other.rate.denominator))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets_round_trip() {
        for layout in [PixelLayout::Bgra, PixelLayout::Argb, PixelLayout::Rgba] {
            let encoded = layout.encode([10, 20, 30, 40]);
            assert_eq!(layout.decode(&encoded), [10, 20, 30, 40]);
        }
        assert_eq!(PixelLayout::Bgra.encode([1, 2, 3, 4]), [3, 2, 1, 4]);
        assert_eq!(PixelLayout::Argb.encode([1, 2, 3, 4]), [4, 1, 2, 3]);
    }

    #[test]
    fn padded_rows_exclude_padding() {
        let width = 2;
        let stride = 12;
        let mut data = vec![0xEE; stride * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let frame = Frame::from_raw(width, 2, PixelLayout::Rgba, stride, data).unwrap();

        assert_eq!(frame.row(0), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(frame.rows().count(), 2);
        assert!(frame.rows().all(|row| row.len() == 8));
    }

    #[test]
    fn from_raw_rejects_short_buffers() {
        assert!(Frame::from_raw(4, 4, PixelLayout::Bgra, 8, vec![0; 64]).is_none());
        assert!(Frame::from_raw(4, 4, PixelLayout::Bgra, 16, vec![0; 63]).is_none());
        assert!(Frame::from_raw(4, 4, PixelLayout::Bgra, 16, vec![0; 64]).is_some());
    }

    #[test]
    fn timestamps_are_exact_rationals() {
        let ntsc = FrameRate::new(30_000, 1_001).unwrap();
        let ts = ntsc.timestamp(30_000);
        assert!((ts.as_secs_f64() - 1_001.0).abs() < 1e-9);

        let a = FrameRate::from_integer(25).unwrap().timestamp(1);
        let b = FrameRate::from_integer(50).unwrap().timestamp(2);
        assert!((a.as_secs_f64() - b.as_secs_f64()).abs() < 1e-12);
        // Same instant, ties broken by tick count.
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert!(ntsc.timestamp(1) < ntsc.timestamp(2));
    }

    #[test]
    fn zero_rates_are_rejected() {
        assert!(FrameRate::new(0, 1).is_none());
        assert!(FrameRate::new(24, 0).is_none());
    }

    #[test]
    fn rates_beyond_i32_are_rejected() {
        let limit = i32::MAX as u32;
        assert!(FrameRate::new(limit, 1).is_some());
        assert!(FrameRate::new(limit + 1, 1).is_none());
        assert!(FrameRate::new(1, limit + 1).is_none());
        assert!(FrameRate::new(u32::MAX, u32::MAX).is_none());
    }
}
