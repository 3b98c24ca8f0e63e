//! Frame ↔ tensor conversion tests.

use videoboost::{
    Frame, PixelLayout, ResizeFilter, SampleRange, Tensor, TensorPacker, TensorShape,
    TensorUnpacker, UpscaleError,
};

fn gradient(width: u32, height: u32, layout: PixelLayout) -> Frame {
    let mut data = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let rgba = [(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8, 255];
            data.extend_from_slice(&layout.encode(rgba));
        }
    }
    Frame::from_raw(width, height, layout, width as usize * 4, data).expect("valid frame")
}

// ── Packing ────────────────────────────────────────────────────────

#[test]
fn pack_is_planar_rgb_in_unit_range() {
    let frame = Frame::filled(4, 4, PixelLayout::Bgra, [255, 51, 0, 255]);
    let packer = TensorPacker::new(TensorShape::image(3, 4, 4));

    let tensor = packer.pack(&frame).expect("pack");
    assert_eq!(tensor.shape(), TensorShape::image(3, 4, 4));
    let view = tensor.view();
    assert_eq!(view[[0, 0, 2, 3]], 1.0);
    assert!((view[[0, 1, 2, 3]] - 0.2).abs() < 1e-6);
    assert_eq!(view[[0, 2, 2, 3]], 0.0);
}

#[test]
fn pack_reads_argb_frames() {
    let frame = Frame::filled(2, 2, PixelLayout::Argb, [0, 0, 255, 17]);
    let tensor = TensorPacker::new(TensorShape::image(3, 2, 2))
        .pack(&frame)
        .expect("pack");
    let view = tensor.view();
    assert_eq!(view[[0, 0, 0, 0]], 0.0);
    assert_eq!(view[[0, 2, 1, 1]], 1.0);
}

#[test]
fn pack_byte_range_keeps_raw_values() {
    let frame = Frame::filled(2, 2, PixelLayout::Bgra, [200, 100, 50, 255]);
    let tensor = TensorPacker::new(TensorShape::image(3, 2, 2))
        .with_sample_range(SampleRange::Byte)
        .pack(&frame)
        .expect("pack");
    let view = tensor.view();
    assert_eq!(view[[0, 0, 0, 0]], 200.0);
    assert_eq!(view[[0, 1, 0, 0]], 100.0);
    assert_eq!(view[[0, 2, 0, 0]], 50.0);
}

#[test]
fn pack_resizes_to_model_input() {
    let frame = Frame::filled(64, 48, PixelLayout::Bgra, [10, 20, 30, 255]);
    for filter in [
        ResizeFilter::Nearest,
        ResizeFilter::Triangle,
        ResizeFilter::CatmullRom,
        ResizeFilter::Lanczos3,
    ] {
        let tensor = TensorPacker::new(TensorShape::image(3, 32, 40))
            .with_filter(filter)
            .pack(&frame)
            .expect("pack");
        assert_eq!(tensor.shape(), TensorShape::image(3, 32, 40));
        let red = tensor.view()[[0, 0, 16, 20]] * 255.0;
        assert!((red - 10.0).abs() < 0.5, "{filter:?} changed a flat colour: {red}");
    }
}

#[test]
fn pack_ignores_row_padding() {
    let width = 3;
    let stride = 16;
    let mut data = vec![0xAB; stride * 2];
    for y in 0..2 {
        for x in 0..width {
            let offset = y * stride + x * 4;
            data[offset..offset + 4].copy_from_slice(&PixelLayout::Bgra.encode([x as u8, 0, 0, 255]));
        }
    }
    let frame = Frame::from_raw(width as u32, 2, PixelLayout::Bgra, stride, data).expect("frame");

    let tensor = TensorPacker::new(TensorShape::image(3, 2, 3))
        .with_sample_range(SampleRange::Byte)
        .pack(&frame)
        .expect("pack");
    let view = tensor.view();
    assert_eq!(view[[0, 0, 1, 2]], 2.0);
    assert_eq!(view[[0, 2, 1, 2]], 0.0);
}

#[test]
fn pack_rejects_unsupported_shapes() {
    let frame = Frame::filled(4, 4, PixelLayout::Bgra, [0, 0, 0, 255]);
    let result = TensorPacker::new(TensorShape::image(4, 4, 4)).pack(&frame);
    assert!(matches!(result, Err(UpscaleError::PackError(_))));

    let result = TensorPacker::new(TensorShape::image(3, 0, 4)).pack(&frame);
    assert!(matches!(result, Err(UpscaleError::PackError(_))));
}

#[test]
fn pack_rejects_empty_frames() {
    let frame = Frame::filled(0, 0, PixelLayout::Bgra, [0, 0, 0, 255]);
    let result = TensorPacker::new(TensorShape::image(3, 4, 4)).pack(&frame);
    assert!(matches!(result, Err(UpscaleError::PackError(_))));
}

// ── Unpacking ──────────────────────────────────────────────────────

#[test]
fn pack_then_unpack_preserves_pixels() {
    let frame = gradient(8, 6, PixelLayout::Bgra);
    let shape = TensorShape::image(3, 6, 8);
    let tensor = TensorPacker::new(shape).pack(&frame).expect("pack");
    let restored = TensorUnpacker::new().unpack(&tensor).expect("unpack");

    assert_eq!((restored.width(), restored.height()), (8, 6));
    for y in 0..6 {
        for x in 0..8 {
            assert_eq!(restored.pixel_rgba(x, y), frame.pixel_rgba(x, y), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn unpack_sanitizes_every_sample() {
    let shape = TensorShape::image(3, 1, 4);
    let values = vec![
        f32::NAN, f32::INFINITY, -1.0, 0.5, // red
        f32::NEG_INFINITY, 2.0, 1.0, 0.0, // green
        0.25, 0.0, f32::NAN, 1.0, // blue
    ];
    let tensor = Tensor::from_shape_vec(shape, values).expect("tensor");
    let frame = TensorUnpacker::new().unpack(&tensor).expect("unpack");

    assert_eq!(frame.pixel_rgba(0, 0), [0, 0, 64, 255]);
    assert_eq!(frame.pixel_rgba(1, 0), [0, 255, 0, 255]);
    assert_eq!(frame.pixel_rgba(2, 0), [0, 255, 0, 255]);
    assert_eq!(frame.pixel_rgba(3, 0), [128, 0, 255, 255]);
}

#[test]
fn unpack_byte_range() {
    let tensor = Tensor::from_fn(TensorShape::image(3, 2, 2), |(_, c, _, _)| [12.4, 300.0, -4.0][c]);
    let frame = TensorUnpacker::new()
        .with_sample_range(SampleRange::Byte)
        .with_layout(PixelLayout::Rgba)
        .unpack(&tensor)
        .expect("unpack");
    assert_eq!(frame.layout(), PixelLayout::Rgba);
    assert_eq!(frame.as_bytes()[..4], [12, 255, 0, 255]);
}

#[test]
fn unpack_single_channel_as_grey() {
    let tensor = Tensor::from_fn(TensorShape::image(1, 2, 2), |_| 0.5);
    let frame = TensorUnpacker::new().unpack(&tensor).expect("unpack");
    assert_eq!(frame.pixel_rgba(1, 1), [128, 128, 128, 255]);
}

#[test]
fn unpack_ignores_extra_channels() {
    let tensor = Tensor::from_fn(TensorShape::image(4, 1, 1), |(_, c, _, _)| c as f32 / 4.0);
    let frame = TensorUnpacker::new().unpack(&tensor).expect("unpack");
    assert_eq!(frame.pixel_rgba(0, 0), [0, 64, 128, 255]);
}

#[test]
fn unpack_rejects_bad_shapes() {
    let batch = Tensor::zeros(TensorShape {
        batch: 2,
        channels: 3,
        height: 2,
        width: 2,
    });
    assert!(matches!(
        TensorUnpacker::new().unpack(&batch),
        Err(UpscaleError::UnpackError(_))
    ));

    let two_channels = Tensor::zeros(TensorShape::image(2, 2, 2));
    assert!(matches!(
        TensorUnpacker::new().unpack(&two_channels),
        Err(UpscaleError::UnpackError(_))
    ));
}
