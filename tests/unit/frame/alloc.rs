use super::*;
use crate::frame::buffer::FrameType;

fn info() -> FrameInfo {
    FrameInfo {
        frame_type: FrameType::Rgba,
        width: 4,
        height: 4,
        pool_depth: 2,
    }
}

#[test]
fn heap_frames_are_sized_and_numbered() {
    let alloc = HeapAllocator::new();
    let a = alloc.new_frame(&info());
    let b = alloc.new_frame(&info());
    assert_eq!(a.capacity(), 64);
    assert_eq!(a.slot(), SlotId(0));
    assert_eq!(b.slot(), SlotId(1));
    assert_eq!(a.id(), 0);
}

#[test]
fn indexed_allocator_looks_up_by_slot() {
    let alloc = IndexedAllocator::new(|slot: SlotId, info: &FrameInfo| {
        Box::new(vec![slot.0 as u8; info.buf_size()]) as Box<dyn ExternalBuffer>
    });
    let a = alloc.new_frame(&info());
    let b = alloc.new_frame(&info());
    assert!(a.data().iter().all(|&v| v == 0));
    assert!(b.data().iter().all(|&v| v == 1));
    assert!(matches!(b.storage(), FrameStorage::External(_)));
}

#[test]
fn empty_allocator_has_no_storage() {
    let f = EmptyAllocator::new().new_frame(&info());
    assert_eq!(f.capacity(), 0);
    assert_eq!(f.width(), 4);
}

#[test]
fn gpu_allocator_asks_provider_for_full_size() {
    struct Fake;
    impl GpuBufferProvider for Fake {
        fn create_buffer(&self, slot: SlotId, size: usize) -> GpuBuffer {
            GpuBuffer {
                handle: 100 + u64::from(slot.0),
                size,
            }
        }
    }

    let alloc = GpuAllocator::new(Fake);
    let f = alloc.new_frame(&info());
    match f.storage() {
        FrameStorage::Gpu(g) => {
            assert_eq!(g.handle, 100);
            assert_eq!(g.size, 64);
        }
        other => panic!("unexpected storage {other:?}"),
    }
}
