use std::sync::Arc;

use crate::{
    frame::{alloc::FrameAllocator, buffer::FrameInfo, forwarder::FrameForwarder},
    io::Sink,
};

/// Accepts composited frames and lets them go unread.
#[derive(Debug)]
pub struct NullSink {
    frames: Arc<FrameForwarder>,
}

impl NullSink {
    pub fn new(name: &str, info: FrameInfo, alloc: &dyn FrameAllocator) -> Self {
        Self {
            frames: Arc::new(FrameForwarder::new(name, info, alloc)),
        }
    }
}

impl Sink for NullSink {
    fn frames(&self) -> &Arc<FrameForwarder> {
        &self.frames
    }

    fn start(&self) -> bool {
        true
    }
}
