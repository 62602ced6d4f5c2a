use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::{
    foundation::{
        core::Rgba8,
        error::{MixError, MixResult},
    },
    frame::{
        alloc::FrameAllocator,
        buffer::{FrameInfo, FrameType},
        decode::{fill_from_image, load_image},
        forwarder::FrameForwarder,
    },
    io::Source,
};

/// A single picture, committed once and held forever.
#[derive(Debug)]
pub struct ImageSource {
    image: image::DynamicImage,
    frames: Arc<FrameForwarder>,
}

/// Read and decode an image file, resizing it when `size` is given.
pub fn load(path: &Path, size: Option<(u32, u32)>) -> MixResult<image::DynamicImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    let img = load_image(&bytes)?;
    Ok(match size {
        Some((w, h)) if (w, h) != (img.width(), img.height()) => {
            img.resize_exact(w, h, image::imageops::FilterType::Triangle)
        }
        _ => img,
    })
}

/// A canvas of one colour; transparent when no colour is given.
pub fn blank((w, h): (u32, u32), colour: Option<&str>) -> MixResult<image::DynamicImage> {
    if w == 0 || h == 0 {
        return Err(MixError::config("blank image needs a non-zero size"));
    }
    let c = match colour {
        Some(hex) => Rgba8::parse_hex(hex)?,
        None => Rgba8 {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        },
    };
    let buf = image::RgbaImage::from_pixel(w, h, image::Rgba([c.r, c.g, c.b, c.a]));
    Ok(image::DynamicImage::ImageRgba8(buf))
}

impl ImageSource {
    pub fn new(name: &str, image: image::DynamicImage, alloc: &dyn FrameAllocator) -> Self {
        let info = FrameInfo {
            frame_type: FrameType::Rgba,
            width: image.width(),
            height: image.height(),
            pool_depth: 2,
        };
        Self {
            image,
            frames: Arc::new(FrameForwarder::new(name, info, alloc)),
        }
    }
}

impl Source for ImageSource {
    fn frames(&self) -> &Arc<FrameForwarder> {
        &self.frames
    }

    fn start(&self) -> bool {
        let stream = self.frames.name();
        self.frames.set_hold(true);
        let Some(mut frame) = self.frames.get_for_writing() else {
            tracing::warn!(stream = %stream, "no frame free for the still image");
            return false;
        };
        match fill_from_image(&self.image, &mut frame) {
            Ok(()) => {
                self.frames.finished_writing(frame);
                tracing::info!(
                    stream = %stream,
                    width = self.image.width(),
                    height = self.image.height(),
                    "still image loaded"
                );
                true
            }
            Err(e) => {
                tracing::warn!(stream = %stream, "{e}");
                self.frames.failed_writing(frame);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/io/image_source.rs"]
mod tests;
