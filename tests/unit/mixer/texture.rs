use super::*;
use crate::frame::{
    alloc::{FrameAllocator, HeapAllocator},
    buffer::FrameInfo,
    decode::decode_yuyv422,
};

fn frame(frame_type: FrameType, width: u32, height: u32) -> Frame {
    HeapAllocator::new().new_frame(&FrameInfo {
        frame_type,
        width,
        height,
        pool_depth: 1,
    })
}

#[test]
fn rgba_is_premultiplied() {
    let mut f = frame(FrameType::Rgba, 1, 1);
    f.data_mut().copy_from_slice(&[255, 128, 0, 128]);
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    assert_eq!(tex.dims(), Dims::new(1, 1));
    assert_eq!(tex.pixels(), &[128, 64, 0, 128]);
}

#[test]
fn rgb_becomes_opaque() {
    let mut f = frame(FrameType::Rgb, 2, 1);
    f.data_mut().copy_from_slice(&[1, 2, 3, 4, 5, 6]);
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    assert_eq!(tex.pixels(), &[1, 2, 3, 255, 4, 5, 6, 255]);
}

#[test]
fn yuv_white_and_black() {
    let mut f = frame(FrameType::Yuv422p, 2, 2);
    decode_yuyv422(&[235, 128, 235, 128, 16, 128, 16, 128], &mut f).unwrap();
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    assert_eq!(&tex.pixels()[..8], &[255, 255, 255, 255, 255, 255, 255, 255]);
    assert_eq!(&tex.pixels()[8..], &[0, 0, 0, 255, 0, 0, 0, 255]);
}

#[test]
fn limited_range_mid_grey_is_neutral() {
    let [r, g, b] = yuv_to_rgb(126, 128, 128);
    assert_eq!(r, g);
    assert_eq!(g, b);
    assert!((120..=135).contains(&r));
}

#[test]
fn yuv_without_planes_is_an_error() {
    let f = frame(FrameType::Yuv422p, 2, 1);
    let mut tex = Texture::new();
    assert!(tex.upload(&f).is_err());
    assert!(tex.is_empty());
}

#[test]
fn short_payload_clears_previous_picture() {
    let mut f = frame(FrameType::Rgba, 2, 2);
    f.data_mut().fill(255);
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    assert!(!tex.is_empty());

    f.set_payload_len(8).unwrap();
    let err = tex.upload(&f).unwrap_err();
    assert!(err.to_string().contains("16 needed"), "{err}");
    assert!(tex.is_empty());
    assert_eq!(tex.dims(), Dims::new(0, 0));
}

#[test]
fn sampling_picks_the_nearest_texel() {
    let mut f = frame(FrameType::Rgb, 2, 1);
    f.data_mut().copy_from_slice(&[10, 0, 0, 20, 0, 0]);
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    assert_eq!(tex.sample(0.25, 0.5)[0], 10);
    assert_eq!(tex.sample(0.75, 0.5)[0], 20);
    assert_eq!(tex.sample(0.999, 0.0)[0], 20);
}

#[test]
fn sampling_outside_is_transparent() {
    let mut f = frame(FrameType::Rgb, 1, 1);
    f.data_mut().fill(200);
    let mut tex = Texture::new();
    tex.upload(&f).unwrap();
    assert_eq!(tex.sample(1.0, 0.5), [0; 4]);
    assert_eq!(tex.sample(-0.01, 0.5), [0; 4]);
    assert_eq!(tex.sample(f64::NAN, 0.5), [0; 4]);
    assert_eq!(Texture::new().sample(0.5, 0.5), [0; 4]);
}
