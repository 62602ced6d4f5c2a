use crate::{
    foundation::{
        core::Dims,
        error::{MixError, MixResult},
    },
    layer::animate::Layer,
    mixer::texture::Texture,
};

pub type PremulRgba8 = [u8; 4];

/// Porter-Duff source-over for premultiplied pixels, with `src` scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Paint every pixel of an RGBA8 canvas with `colour`.
pub fn fill(dst: &mut [u8], colour: PremulRgba8) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&colour);
    }
}

/// Turn a premultiplied canvas back into straight alpha for encoders.
pub fn unpremultiply(dst: &mut [u8]) {
    for px in dst.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Pixel rectangle `[x0, x1) x [y0, y1)` a layer covers, clipped to the output.
fn covered(layer: &Layer, out: Dims) -> Option<(usize, usize, usize, usize, f64, f64, f64, f64)> {
    let (ow, oh) = (f64::from(out.width), f64::from(out.height));
    let (lx, ly) = (layer.position.x * ow, layer.position.y * oh);
    let (lw, lh) = (layer.size.x * ow, layer.size.y * oh);
    if !(lw > 0.0 && lh > 0.0 && lx.is_finite() && ly.is_finite()) {
        return None;
    }
    let x0 = lx.max(0.0).floor() as usize;
    let y0 = ly.max(0.0).floor() as usize;
    let x1 = (lx + lw).min(ow).ceil().max(0.0) as usize;
    let y1 = (ly + lh).min(oh).ceil().max(0.0) as usize;
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1, lx, ly, lw, lh))
}

/// Blend one layer's texture onto an RGBA8 canvas with nearest-neighbour sampling.
pub fn draw_layer(dst: &mut [u8], out: Dims, tex: &Texture, layer: &Layer) -> MixResult<()> {
    if dst.len() != out.pixels() * 4 {
        return Err(MixError::decode(format!(
            "canvas of {} bytes does not match {}x{} RGBA",
            dst.len(),
            out.width,
            out.height
        )));
    }
    if tex.is_empty() || !layer.is_visible() {
        return Ok(());
    }
    let Some((x0, y0, x1, y1, lx, ly, lw, lh)) = covered(layer, out) else {
        return Ok(());
    };

    let opacity = layer.opacity as f32;
    let stride = out.width as usize * 4;
    for y in y0..y1 {
        let v = (y as f64 + 0.5 - ly) / lh;
        let row = &mut dst[y * stride..(y + 1) * stride];
        for x in x0..x1 {
            let u = (x as f64 + 0.5 - lx) / lw;
            let src = tex.sample(u, v);
            let px = &mut row[x * 4..x * 4 + 4];
            let blended = over([px[0], px[1], px[2], px[3]], src, opacity);
            px.copy_from_slice(&blended);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/mixer/composite.rs"]
mod tests;
