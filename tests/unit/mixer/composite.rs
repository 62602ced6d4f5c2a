use super::*;
use crate::{
    frame::{
        alloc::{FrameAllocator, HeapAllocator},
        buffer::{FrameInfo, FrameType},
    },
    layer::transform::LayerTransform,
};

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> Texture {
    let mut f = HeapAllocator::new().new_frame(&FrameInfo {
        frame_type: FrameType::Rgb,
        width: w,
        height: h,
        pool_depth: 1,
    });
    for px in f.data_mut().chunks_exact_mut(3) {
        px.copy_from_slice(&rgb);
    }
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    tex
}

fn layer(out: Dims, src: Dims, t: LayerTransform) -> Layer {
    let mut l = Layer::new(0, out, src);
    l.apply_state(Some(t.into()));
    l
}

fn px(canvas: &[u8], out: Dims, x: u32, y: u32) -> [u8; 4] {
    let i = (y * out.width + x) as usize * 4;
    [canvas[i], canvas[i + 1], canvas[i + 2], canvas[i + 3]]
}

#[test]
fn over_opaque_replaces() {
    assert_eq!(over([1, 2, 3, 255], [9, 8, 7, 255], 1.0), [9, 8, 7, 255]);
}

#[test]
fn over_zero_opacity_keeps_dst() {
    assert_eq!(over([1, 2, 3, 255], [9, 8, 7, 255], 0.0), [1, 2, 3, 255]);
    assert_eq!(over([1, 2, 3, 255], [0, 0, 0, 0], 1.0), [1, 2, 3, 255]);
}

#[test]
fn over_half_opacity_blends() {
    let out = over([0, 0, 0, 255], [255, 255, 255, 255], 0.5);
    assert!((127..=129).contains(&out[0]), "{out:?}");
    assert_eq!(out[3], 255);
}

#[test]
fn fill_paints_every_pixel() {
    let mut canvas = vec![0u8; 3 * 2 * 4];
    fill(&mut canvas, [1, 2, 3, 4]);
    assert!(canvas.chunks_exact(4).all(|p| p == [1, 2, 3, 4]));
}

#[test]
fn full_screen_layer_covers_the_canvas() {
    let out = Dims::new(4, 2);
    let mut canvas = vec![0u8; out.pixels() * 4];
    let tex = solid(2, 1, [200, 10, 10]);
    let l = layer(out, Dims::new(4, 2), LayerTransform::default());
    draw_layer(&mut canvas, out, &tex, &l).unwrap();
    assert!(canvas.chunks_exact(4).all(|p| p == [200, 10, 10, 255]));
}

#[test]
fn quarter_layer_stays_in_its_corner() {
    let out = Dims::new(4, 4);
    let mut canvas = vec![0u8; out.pixels() * 4];
    let tex = solid(1, 1, [0, 255, 0]);
    let t = LayerTransform {
        x: 0.5,
        y: 0.5,
        scale: 0.5,
        opacity: 1.0,
    };
    draw_layer(&mut canvas, out, &tex, &layer(out, out, t)).unwrap();
    assert_eq!(px(&canvas, out, 0, 0), [0, 0, 0, 0]);
    assert_eq!(px(&canvas, out, 1, 1), [0, 0, 0, 0]);
    assert_eq!(px(&canvas, out, 2, 2), [0, 255, 0, 255]);
    assert_eq!(px(&canvas, out, 3, 3), [0, 255, 0, 255]);
}

#[test]
fn layer_past_the_edge_is_clipped() {
    let out = Dims::new(4, 4);
    let mut canvas = vec![0u8; out.pixels() * 4];
    let tex = solid(1, 1, [255, 0, 0]);
    let t = LayerTransform {
        x: 0.75,
        y: -0.5,
        scale: 1.0,
        opacity: 1.0,
    };
    draw_layer(&mut canvas, out, &tex, &layer(out, out, t)).unwrap();
    assert_eq!(px(&canvas, out, 3, 0), [255, 0, 0, 255]);
    assert_eq!(px(&canvas, out, 2, 0), [0, 0, 0, 0]);
    assert_eq!(px(&canvas, out, 3, 2), [0, 0, 0, 0]);
}

#[test]
fn narrower_source_keeps_its_aspect() {
    // A square source on a 2:1 output is twice as tall as it is wide in normalised units.
    let out = Dims::new(8, 4);
    let mut canvas = vec![0u8; out.pixels() * 4];
    let tex = solid(2, 2, [0, 0, 255]);
    let t = LayerTransform {
        x: 0.0,
        y: 0.0,
        scale: 0.25,
        opacity: 1.0,
    };
    draw_layer(&mut canvas, out, &tex, &layer(out, Dims::new(2, 2), t)).unwrap();
    assert_eq!(px(&canvas, out, 1, 1), [0, 0, 255, 255]);
    assert_eq!(px(&canvas, out, 2, 0), [0, 0, 0, 0]);
    assert_eq!(px(&canvas, out, 0, 2), [0, 0, 0, 0]);
}

#[test]
fn invisible_layer_and_empty_texture_draw_nothing() {
    let out = Dims::new(2, 2);
    let mut canvas = vec![7u8; out.pixels() * 4];
    let hidden = LayerTransform {
        opacity: 0.0,
        ..LayerTransform::default()
    };
    let tex = solid(1, 1, [255, 255, 255]);
    draw_layer(&mut canvas, out, &tex, &layer(out, out, hidden)).unwrap();
    draw_layer(
        &mut canvas,
        out,
        &Texture::new(),
        &layer(out, out, LayerTransform::default()),
    )
    .unwrap();
    assert!(canvas.iter().all(|&b| b == 7));
}

#[test]
fn canvas_size_mismatch_is_an_error() {
    let out = Dims::new(2, 2);
    let mut canvas = vec![0u8; 3];
    let tex = solid(1, 1, [1, 1, 1]);
    let l = layer(out, out, LayerTransform::default());
    assert!(draw_layer(&mut canvas, out, &tex, &l).is_err());
}

#[test]
fn unpremultiply_restores_straight_alpha() {
    let mut canvas = vec![64, 32, 0, 128, 9, 9, 9, 255, 0, 0, 0, 0];
    unpremultiply(&mut canvas);
    assert_eq!(canvas, vec![128, 64, 0, 128, 9, 9, 9, 255, 0, 0, 0, 0]);
}
