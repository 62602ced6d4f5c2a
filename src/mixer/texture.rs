use crate::{
    foundation::{
        core::Dims,
        error::{MixError, MixResult},
    },
    frame::buffer::{Frame, FrameType},
};

/// Premultiplied RGBA8 copy of a source's latest frame, ready for sampling.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Texture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Forget the picture. Nothing is drawn for an empty texture.
    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels.clear();
    }

    /// Convert `frame` into this texture, reusing the allocation.
    pub fn upload(&mut self, frame: &Frame) -> MixResult<()> {
        let (w, h) = (frame.width(), frame.height());
        let n = Dims::new(w, h).pixels();
        let mut pixels = std::mem::take(&mut self.pixels);
        pixels.clear();
        pixels.reserve(n * 4);

        let converted = match frame.frame_type() {
            FrameType::Rgba => rgba_to_premul(frame, n, &mut pixels),
            FrameType::Rgb => rgb_to_rgba(frame, n, &mut pixels),
            FrameType::Yuv422p => yuv422p_to_rgba(frame, &mut pixels),
        };
        if let Err(e) = converted {
            self.pixels = pixels;
            self.clear();
            return Err(e);
        }

        self.width = w;
        self.height = h;
        self.pixels = pixels;
        Ok(())
    }

    /// Nearest texel at normalised coordinates; transparent outside `0..1`.
    pub fn sample(&self, u: f64, v: f64) -> [u8; 4] {
        if self.is_empty() || !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return [0; 4];
        }
        let x = ((u * f64::from(self.width)) as u32).min(self.width - 1) as usize;
        let y = ((v * f64::from(self.height)) as u32).min(self.height - 1) as usize;
        let i = (y * self.width as usize + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

fn short(frame: &Frame, need: usize) -> MixError {
    MixError::decode(format!(
        "{} frame {} carries {} bytes, {need} needed",
        frame.frame_type(),
        frame.id(),
        frame.data().len()
    ))
}

fn rgba_to_premul(frame: &Frame, n: usize, out: &mut Vec<u8>) -> MixResult<()> {
    let data = frame.data();
    if data.len() < n * 4 {
        return Err(short(frame, n * 4));
    }
    for px in data[..n * 4].chunks_exact(4) {
        let a = u16::from(px[3]);
        let mul = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        out.extend_from_slice(&[mul(px[0]), mul(px[1]), mul(px[2]), px[3]]);
    }
    Ok(())
}

fn rgb_to_rgba(frame: &Frame, n: usize, out: &mut Vec<u8>) -> MixResult<()> {
    let data = frame.data();
    if data.len() < n * 3 {
        return Err(short(frame, n * 3));
    }
    for px in data[..n * 3].chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    Ok(())
}

/// BT.601 limited range, the default for raw YUYV from capture devices and ffmpeg.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

fn yuv422p_to_rgba(frame: &Frame, out: &mut Vec<u8>) -> MixResult<()> {
    let (Some(ys), Some(us), Some(vs)) =
        (frame.plane_data(0), frame.plane_data(1), frame.plane_data(2))
    else {
        return Err(MixError::decode(format!(
            "YUV422p frame {} has no plane layout",
            frame.id()
        )));
    };
    let w = frame.width() as usize;
    let cw = w / 2;
    for row in 0..frame.height() as usize {
        for col in 0..w {
            let ci = row * cw + (col / 2).min(cw.saturating_sub(1));
            let y = ys.get(row * w + col).copied();
            let (u, v) = (us.get(ci).copied(), vs.get(ci).copied());
            let (Some(y), Some(u), Some(v)) = (y, u, v) else {
                return Err(short(frame, frame.planes().iter().map(|p| p.end).max().unwrap_or(0)));
            };
            let [r, g, b] = yuv_to_rgb(y, u, v);
            out.extend_from_slice(&[r, g, b, 255]);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/mixer/texture.rs"]
mod tests;
