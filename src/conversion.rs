//! Internal conversions between FFmpeg types and the crate's own.
//!
//! Pixel copies between FFmpeg frames and [`Frame`] buffers happen here and
//! nowhere else; both directions walk rows so that differing strides on
//! either side are respected.

use std::time::Duration;

use ffmpeg_next::{Rational, format::Pixel, frame::Video as VideoFrame};

use crate::frame::{Frame, FrameRate, PixelLayout};

/// FFmpeg pixel format matching an interleaved layout.
pub(crate) fn layout_to_pixel(layout: PixelLayout) -> Pixel {
    match layout {
        PixelLayout::Bgra => Pixel::BGRA,
        PixelLayout::Argb => Pixel::ARGB,
        PixelLayout::Rgba => Pixel::RGBA,
    }
}

/// Rescale a PTS value from stream time base to a [`Duration`].
///
/// Negative timestamps (pre-roll) clamp to zero.
pub(crate) fn pts_to_duration(pts: i64, time_base: Rational) -> Duration {
    let seconds =
        pts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64;
    Duration::from_secs_f64(seconds.max(0.0))
}

/// Convert an FFmpeg rate into a [`FrameRate`], rejecting zero or negative
/// components.
pub(crate) fn rational_to_frame_rate(rate: Rational) -> Option<FrameRate> {
    let numerator = u32::try_from(rate.numerator()).ok()?;
    let denominator = u32::try_from(rate.denominator()).ok()?;
    FrameRate::new(numerator, denominator)
}

// `FrameRate::new` bounds both parts to `i32::MAX`, so the casts below are
// lossless.

/// Encoder time base for a frame rate: one tick per frame.
pub(crate) fn frame_rate_time_base(rate: FrameRate) -> Rational {
    Rational::new(rate.denominator() as i32, rate.numerator() as i32)
}

/// The frame rate as an FFmpeg rational.
pub(crate) fn frame_rate_to_rational(rate: FrameRate) -> Rational {
    Rational::new(rate.numerator() as i32, rate.denominator() as i32)
}

/// Copy plane 0 of a packed 32-bit FFmpeg frame into a tightly packed
/// [`Frame`].
pub(crate) fn video_frame_to_frame(
    video_frame: &VideoFrame,
    layout: PixelLayout,
) -> Option<Frame> {
    let width = video_frame.width();
    let height = video_frame.height();
    let row_len = width as usize * PixelLayout::BYTES_PER_PIXEL;
    let stride = video_frame.stride(0);
    let data = video_frame.data(0);

    let buffer = if stride == row_len {
        data.get(..row_len * height as usize)?.to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(data.get(start..start + row_len)?);
        }
        buffer
    };

    Frame::from_raw(width, height, layout, row_len, buffer)
}

/// Copy a [`Frame`] into plane 0 of an FFmpeg frame of the same size and
/// layout.
pub(crate) fn frame_to_video_frame(frame: &Frame) -> VideoFrame {
    let mut video_frame = VideoFrame::new(
        layout_to_pixel(frame.layout()),
        frame.width(),
        frame.height(),
    );
    let stride = video_frame.stride(0);
    let row_len = frame.row_len();
    let destination = video_frame.data_mut(0);
    for (index, row) in frame.rows().enumerate() {
        let start = index * stride;
        destination[start..start + row_len].copy_from_slice(row);
    }
    video_frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_rescales_through_time_base() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_duration(90_000, time_base), Duration::from_secs(1));
        assert_eq!(pts_to_duration(-3_000, time_base), Duration::ZERO);
    }

    #[test]
    fn frame_rate_conversions() {
        assert_eq!(
            rational_to_frame_rate(Rational::new(30_000, 1_001)),
            FrameRate::new(30_000, 1_001)
        );
        assert!(rational_to_frame_rate(Rational::new(0, 1)).is_none());
        assert!(rational_to_frame_rate(Rational::new(-1, 1)).is_none());

        let rate = FrameRate::new(24_000, 1_001).unwrap();
        let time_base = frame_rate_time_base(rate);
        assert_eq!(time_base.numerator(), 1_001);
        assert_eq!(time_base.denominator(), 24_000);
    }

    #[test]
    fn largest_frame_rate_converts_without_wrapping() {
        let rate = FrameRate::new(i32::MAX as u32, 1).unwrap();
        assert_eq!(frame_rate_to_rational(rate).numerator(), i32::MAX);
        assert_eq!(frame_rate_time_base(rate).denominator(), i32::MAX);
        assert_eq!(rational_to_frame_rate(frame_rate_to_rational(rate)), Some(rate));
    }
}
