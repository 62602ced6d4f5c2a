use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

use crate::foundation::{
    core::Dims,
    error::{MixError, MixResult, protocol_violation},
};

/// Pixel layout of a frame stream.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Planar 4:2:2 YUV: a full-size Y plane and two half-width chroma planes.
    #[default]
    Yuv422p,
    /// Packed 8-bit RGBA.
    Rgba,
    /// Packed 8-bit RGB.
    Rgb,
}

impl FrameType {
    /// Average bytes per pixel across all planes.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Yuv422p => 2,
            Self::Rgba => 4,
            Self::Rgb => 3,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yuv422p => "YUV422p",
            Self::Rgba => "RGBA",
            Self::Rgb => "RGB",
        })
    }
}

/// Size and pool depth of a frame stream, as configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameCfg {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_pool_depth")]
    pub num_allocated_frames: usize,
}

fn default_pool_depth() -> usize {
    3
}

impl FrameCfg {
    pub fn validate(&self) -> MixResult<()> {
        if self.num_allocated_frames < 1 {
            return Err(MixError::config(
                "number of allocated frames must be at least 1",
            ));
        }
        if self.width < 1 {
            return Err(MixError::config("width must be at least 1"));
        }
        if self.height < 1 {
            return Err(MixError::config("height must be at least 1"));
        }
        Ok(())
    }
}

/// Everything an allocator needs to know to build the frames of one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_type: FrameType,
    pub width: u32,
    pub height: u32,
    pub pool_depth: usize,
}

impl FrameInfo {
    pub fn new(frame_type: FrameType, cfg: FrameCfg) -> Self {
        Self {
            frame_type,
            width: cfg.width,
            height: cfg.height,
            pool_depth: cfg.num_allocated_frames,
        }
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.width, self.height)
    }

    /// Bytes needed for one full frame of this type and size.
    pub fn buf_size(&self) -> usize {
        self.dims().pixels() * self.frame_type.bytes_per_pixel()
    }
}

/// Permanent position of a frame within its pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

/// Storage owned by something other than the pool, addressed through this trait.
///
/// Device drivers that map buffers into the process implement this; the engine only ever reads
/// and writes through the slices.
pub trait ExternalBuffer: Send + Sync + fmt::Debug {
    fn bytes(&self) -> &[u8];
    fn bytes_mut(&mut self) -> &mut [u8];
}

impl ExternalBuffer for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// Opaque GPU buffer reference. Pixels never pass through host memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuBuffer {
    pub handle: u64,
    pub size: usize,
}

/// Backing storage of a frame, one variant per ownership model.
#[derive(Debug)]
pub enum FrameStorage {
    /// Heap bytes owned by the pool, sized once at allocation.
    Pooled(Vec<u8>),
    /// Memory owned by an external driver, looked up by slot.
    External(Box<dyn ExternalBuffer>),
    /// Storage handed over by the writer on every cycle; empty until attached.
    Supplied(Vec<u8>),
    /// GPU-resident buffer.
    Gpu(GpuBuffer),
}

impl FrameStorage {
    fn capacity(&self) -> usize {
        match self {
            Self::Pooled(v) | Self::Supplied(v) => v.len(),
            Self::External(b) => b.bytes().len(),
            Self::Gpu(g) => g.size,
        }
    }

    fn host(&self) -> Option<&[u8]> {
        match self {
            Self::Pooled(v) | Self::Supplied(v) => Some(v),
            Self::External(b) => Some(b.bytes()),
            Self::Gpu(_) => None,
        }
    }

    fn host_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::Pooled(v) | Self::Supplied(v) => Some(v),
            Self::External(b) => Some(b.bytes_mut()),
            Self::Gpu(_) => None,
        }
    }
}

/// One sub-region of a frame's storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Plane {
    pub start: usize,
    pub end: usize,
    pub width: u32,
    pub height: u32,
}

impl Plane {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

pub const MAX_PLANES: usize = 3;

/// One decoded image buffer plus the bookkeeping the forwarder needs to cycle it.
pub struct Frame {
    storage: FrameStorage,
    payload_len: usize,
    planes: [Plane; MAX_PLANES],
    num_planes: usize,
    frame_type: FrameType,
    width: u32,
    height: u32,
    id: u64,
    slot: SlotId,
    owner: u64,
    readers: AtomicU32,
    marked_for_recycling: AtomicBool,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("type", &self.frame_type)
            .field("size", &(self.width, self.height))
            .field("payload_len", &self.payload_len)
            .field("num_planes", &self.num_planes)
            .field("readers", &self.readers())
            .finish_non_exhaustive()
    }
}

impl Frame {
    pub fn new(storage: FrameStorage, info: &FrameInfo, slot: SlotId) -> Self {
        let payload_len = storage.capacity();
        Self {
            storage,
            payload_len,
            planes: [Plane::default(); MAX_PLANES],
            num_planes: 0,
            frame_type: info.frame_type,
            width: info.width,
            height: info.height,
            id: 0,
            slot,
            owner: 0,
            readers: AtomicU32::new(0),
            marked_for_recycling: AtomicBool::new(false),
        }
    }

    /// Writer-assigned sequence number. `0` means the frame was never handed out for writing.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.width, self.height)
    }

    pub fn storage(&self) -> &FrameStorage {
        &self.storage
    }

    /// Size of the backing storage, independent of how much of it was filled this cycle.
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// The filled part of the storage. Empty for GPU-resident frames.
    pub fn data(&self) -> &[u8] {
        match self.storage.host() {
            Some(bytes) => &bytes[..self.payload_len],
            None => &[],
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let len = self.payload_len;
        match self.storage.host_mut() {
            Some(bytes) => &mut bytes[..len],
            None => &mut [],
        }
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Shrink the visible payload after a short delivery. Capacity is left alone.
    pub fn set_payload_len(&mut self, len: usize) -> MixResult<()> {
        if len > self.capacity() {
            return Err(MixError::decode(format!(
                "payload of {len} bytes exceeds frame capacity of {}",
                self.capacity()
            )));
        }
        self.payload_len = len;
        self.clear_planes();
        Ok(())
    }

    /// Hand caller-owned bytes to a frame built by the empty allocator.
    pub fn attach(&mut self, bytes: Vec<u8>) -> MixResult<()> {
        match &mut self.storage {
            FrameStorage::Supplied(v) => {
                self.payload_len = bytes.len();
                *v = bytes;
                self.clear_planes();
                Ok(())
            }
            _ => Err(MixError::decode(
                "only caller-supplied frames accept attached storage",
            )),
        }
    }

    pub fn clear_planes(&mut self) {
        self.num_planes = 0;
        self.planes = [Plane::default(); MAX_PLANES];
    }

    /// Describe the next `len` bytes of the payload as a `width`x`height` plane.
    pub fn push_plane(&mut self, len: usize, width: u32, height: u32) -> MixResult<Plane> {
        if self.num_planes == MAX_PLANES {
            return Err(MixError::decode("a frame has at most three planes"));
        }
        let start = self.planes_end();
        let end = start + len;
        if end > self.payload_len {
            return Err(MixError::decode(format!(
                "plane {} needs bytes {start}..{end} but the payload is {} bytes",
                self.num_planes, self.payload_len
            )));
        }
        let plane = Plane {
            start,
            end,
            width,
            height,
        };
        self.planes[self.num_planes] = plane;
        self.num_planes += 1;
        Ok(plane)
    }

    pub fn num_planes(&self) -> usize {
        self.num_planes
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes[..self.num_planes]
    }

    /// Bytes of plane `idx`, if it exists and the frame has host storage.
    pub fn plane_data(&self, idx: usize) -> Option<&[u8]> {
        let plane = self.planes().get(idx)?;
        self.storage.host().map(|b| &b[plane.start..plane.end])
    }

    /// Mutable bytes of every plane at once, in plane order.
    pub fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        let planes = self.planes;
        let num = self.num_planes;
        let Some(mut rest) = self.storage.host_mut() else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(num);
        let mut consumed = 0;
        for plane in &planes[..num] {
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(plane.start - consumed);
            let (bytes, tail) = tail.split_at_mut(plane.len());
            out.push(bytes);
            rest = tail;
            consumed = plane.end;
        }
        out
    }

    fn planes_end(&self) -> usize {
        self.planes[..self.num_planes]
            .last()
            .map(|p| p.end)
            .unwrap_or(0)
    }

    /// Number of readers currently holding this frame.
    pub fn readers(&self) -> u32 {
        self.readers.load(Ordering::Acquire)
    }

    pub fn is_marked_for_recycling(&self) -> bool {
        self.marked_for_recycling.load(Ordering::Acquire)
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: u64) {
        self.owner = owner;
    }

    pub(crate) fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    pub(crate) fn acquire_reader(&self) {
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one reader and return how many remain.
    pub(crate) fn release_reader(&self, stream: &str) -> u32 {
        match self
            .readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => protocol_violation(stream, "finished reading a frame with no readers"),
        }
    }

    pub(crate) fn mark_for_recycling(&self, marked: bool) {
        self.marked_for_recycling.store(marked, Ordering::Release);
    }

    /// Bring a frame back to a blank writable state for the next cycle.
    pub(crate) fn reset_for_writing(&mut self) {
        self.clear_planes();
        self.mark_for_recycling(false);
        if let FrameStorage::Supplied(v) = &mut self.storage {
            v.clear();
        }
        self.payload_len = self.capacity();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frame/buffer.rs"]
mod tests;
