use anyhow::Context;

use crate::{
    foundation::error::{MixError, MixResult},
    frame::buffer::{Frame, FrameType},
};

fn expect_type(frame: &Frame, want: &[FrameType]) -> MixResult<()> {
    if want.contains(&frame.frame_type()) {
        return Ok(());
    }
    Err(MixError::decode(format!(
        "cannot fill a {} frame here",
        frame.frame_type()
    )))
}

/// Lay out the Y, U and V planes of a planar 4:2:2 frame over its payload.
pub fn prepare_yuv422p(frame: &mut Frame) -> MixResult<()> {
    expect_type(frame, &[FrameType::Yuv422p])?;
    let (w, h) = (frame.width(), frame.height());
    let luma = w as usize * h as usize;
    let chroma = (w / 2) as usize * h as usize;

    frame.clear_planes();
    frame.push_plane(luma, w, h)?;
    frame.push_plane(chroma, w / 2, h)?;
    frame.push_plane(chroma, w / 2, h)?;
    Ok(())
}

/// Unpack interleaved `Y0 U Y1 V` samples into the planes of a YUV422p frame.
pub fn decode_yuyv422(packed: &[u8], frame: &mut Frame) -> MixResult<()> {
    if frame.width() % 2 != 0 {
        return Err(MixError::decode(format!(
            "YUYV422 rows pair up pixels, width {} is odd",
            frame.width()
        )));
    }
    prepare_yuv422p(frame)?;
    let pairs = frame.planes()[1].len();
    if packed.len() < pairs * 4 {
        return Err(MixError::decode(format!(
            "got a buffer of {} bytes when {} were expected",
            packed.len(),
            pairs * 4
        )));
    }

    let mut planes = frame.planes_mut();
    let [y, u, v] = planes.as_mut_slice() else {
        return Err(MixError::decode("YUV422p frame must have three planes"));
    };
    for (i, px) in packed.chunks_exact(4).take(pairs).enumerate() {
        y[i * 2] = px[0];
        u[i] = px[1];
        y[i * 2 + 1] = px[2];
        v[i] = px[3];
    }
    Ok(())
}

/// Copy a decoded still image into an RGBA or RGB frame of exactly the same size.
pub fn fill_from_image(img: &image::DynamicImage, frame: &mut Frame) -> MixResult<()> {
    expect_type(frame, &[FrameType::Rgba, FrameType::Rgb])?;
    if (img.width(), img.height()) != (frame.width(), frame.height()) {
        return Err(MixError::decode(format!(
            "image is {}x{} but the frame is {}x{}",
            img.width(),
            img.height(),
            frame.width(),
            frame.height()
        )));
    }

    let pixels = match frame.frame_type() {
        FrameType::Rgb => img.to_rgb8().into_raw(),
        _ => img.to_rgba8().into_raw(),
    };
    let (w, h) = (frame.width(), frame.height());
    frame.clear_planes();
    frame.push_plane(pixels.len(), w, h)?;
    frame.data_mut()[..pixels.len()].copy_from_slice(&pixels);
    Ok(())
}

/// Decode an encoded image file (PNG, JPEG, ...) from memory.
pub fn load_image(bytes: &[u8]) -> MixResult<image::DynamicImage> {
    Ok(image::load_from_memory(bytes).context("decode image from memory")?)
}

#[cfg(test)]
#[path = "../../tests/unit/frame/decode.rs"]
mod tests;
