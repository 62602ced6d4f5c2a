use std::sync::atomic::{AtomicU32, Ordering};

use crate::frame::buffer::{
    ExternalBuffer, Frame, FrameInfo, FrameStorage, GpuBuffer, SlotId,
};

/// Factory for frame storage under one ownership model.
///
/// Forwarders call this exactly `pool_depth` times when they are created. Allocators keep no
/// state besides the slot counter, so one instance can serve every stream.
pub trait FrameAllocator: Send + Sync {
    fn new_frame(&self, info: &FrameInfo) -> Frame;
}

#[derive(Debug, Default)]
struct SlotCounter(AtomicU32);

impl SlotCounter {
    fn next(&self) -> SlotId {
        SlotId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Fresh heap buffers owned by the pool, sized to `type x width x height`.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    slots: SlotCounter,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameAllocator for HeapAllocator {
    fn new_frame(&self, info: &FrameInfo) -> Frame {
        let slot = self.slots.next();
        Frame::new(FrameStorage::Pooled(vec![0; info.buf_size()]), info, slot)
    }
}

/// Storage fetched from an external owner by slot, e.g. driver-mapped capture buffers.
pub struct IndexedAllocator<F> {
    slots: SlotCounter,
    lookup: F,
}

impl<F> std::fmt::Debug for IndexedAllocator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedAllocator")
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl<F> IndexedAllocator<F>
where
    F: Fn(SlotId, &FrameInfo) -> Box<dyn ExternalBuffer> + Send + Sync,
{
    pub fn new(lookup: F) -> Self {
        Self {
            slots: SlotCounter::default(),
            lookup,
        }
    }
}

impl<F> FrameAllocator for IndexedAllocator<F>
where
    F: Fn(SlotId, &FrameInfo) -> Box<dyn ExternalBuffer> + Send + Sync,
{
    fn new_frame(&self, info: &FrameInfo) -> Frame {
        let slot = self.slots.next();
        let buffer = (self.lookup)(slot, info);
        Frame::new(FrameStorage::External(buffer), info, slot)
    }
}

/// Zero-length frames; the writer attaches real bytes with [`Frame::attach`] on every cycle.
#[derive(Debug, Default)]
pub struct EmptyAllocator {
    slots: SlotCounter,
}

impl EmptyAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameAllocator for EmptyAllocator {
    fn new_frame(&self, info: &FrameInfo) -> Frame {
        let slot = self.slots.next();
        Frame::new(FrameStorage::Supplied(Vec::new()), info, slot)
    }
}

/// Creates GPU buffers for a graphics backend.
pub trait GpuBufferProvider: Send + Sync {
    fn create_buffer(&self, slot: SlotId, size: usize) -> GpuBuffer;
}

/// Frames whose storage lives on the GPU.
#[derive(Debug, Default)]
pub struct GpuAllocator<P> {
    slots: SlotCounter,
    provider: P,
}

impl<P: GpuBufferProvider> GpuAllocator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            slots: SlotCounter::default(),
            provider,
        }
    }
}

impl<P: GpuBufferProvider> FrameAllocator for GpuAllocator<P> {
    fn new_frame(&self, info: &FrameInfo) -> Frame {
        let slot = self.slots.next();
        let buffer = self.provider.create_buffer(slot, info.buf_size());
        Frame::new(FrameStorage::Gpu(buffer), info, slot)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frame/alloc.rs"]
mod tests;
