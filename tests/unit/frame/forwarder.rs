use super::*;
use crate::frame::{
    alloc::{HeapAllocator, IndexedAllocator},
    buffer::{ExternalBuffer, FrameType, SlotId},
};

fn fwd(depth: usize) -> FrameForwarder {
    let info = FrameInfo {
        frame_type: FrameType::Rgba,
        width: 2,
        height: 2,
        pool_depth: depth,
    };
    FrameForwarder::new("test", info, &HeapAllocator::new())
}

fn commit(f: &FrameForwarder, fill: u8) -> u64 {
    let mut w = f.get_for_writing().expect("pool has a writable frame");
    w.data_mut().fill(fill);
    let id = w.id();
    f.finished_writing(w);
    id
}

fn assert_accounted(f: &FrameForwarder) {
    let st = f.stats();
    assert_eq!(st.accounted(), st.pool_depth, "{st:?}");
}

#[test]
fn ids_increase_from_one() {
    let f = fwd(2);
    assert_eq!(commit(&f, 1), 1);
    assert_eq!(commit(&f, 2), 2);
    assert_eq!(f.stats().forwarded, 2);
}

#[test]
fn nothing_to_read_before_first_commit() {
    let f = fwd(2);
    let mut cursor = ReadCursor::new();
    assert!(f.get_fresh_for_reading(&mut cursor).is_none());
    assert!(f.get_any_for_reading().is_none());
    assert!(!f.is_live());
}

#[test]
fn fresh_read_sees_each_commit_once() {
    let f = fwd(3);
    let mut cursor = ReadCursor::new();
    commit(&f, 7);

    let r = f.get_fresh_for_reading(&mut cursor).unwrap();
    assert_eq!(r.id(), 1);
    assert!(r.data().iter().all(|&b| b == 7));
    f.finished_reading(r);

    assert!(f.get_fresh_for_reading(&mut cursor).is_none());
    commit(&f, 8);
    let r = f.get_fresh_for_reading(&mut cursor).unwrap();
    assert_eq!(r.id(), 2);
    f.finished_reading(r);
    assert_accounted(&f);
}

#[test]
fn separate_cursors_each_see_the_frame() {
    let f = fwd(2);
    let mut render = ReadCursor::new();
    let mut snapshot = ReadCursor::new();
    commit(&f, 1);

    let a = f.get_fresh_for_reading(&mut render).unwrap();
    let b = f.get_fresh_for_reading(&mut snapshot).unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!(a.readers(), 2);
    f.finished_reading(a);
    f.finished_reading(b);

    assert!(f.get_fresh_for_reading(&mut render).is_none());
    assert!(f.get_fresh_for_reading(&mut snapshot).is_none());
}

#[test]
fn backpressure_with_single_frame_pool() {
    let f = fwd(1);
    let mut cursor = ReadCursor::new();

    assert_eq!(commit(&f, 1), 1);
    let held = f.get_fresh_for_reading(&mut cursor).unwrap();

    // The only frame is current and read: nothing left to write into.
    assert!(f.get_for_writing().is_none());
    assert_eq!(f.stats().dropped_out, 1);
    assert_eq!(f.available_for_writing(), 0);
    f.finished_reading(held);

    // Still current, so still not writable.
    assert_eq!(f.available_for_writing(), 0);
    assert_accounted(&f);
}

#[test]
fn superseded_frame_returns_after_last_reader() {
    let f = fwd(2);
    let mut cursor = ReadCursor::new();
    commit(&f, 1);
    let a = f.get_fresh_for_reading(&mut cursor).unwrap();

    commit(&f, 2);
    let st = f.stats();
    assert_eq!(st.pending_recycle, 1);
    assert_eq!(st.writable, 0);
    assert!(a.is_marked_for_recycling());
    assert_accounted(&f);

    f.finished_reading(a);
    let st = f.stats();
    assert_eq!(st.pending_recycle, 0);
    assert_eq!(st.writable, 1);
    assert_accounted(&f);
}

#[test]
fn unread_previous_frame_is_recycled_on_commit() {
    let f = fwd(2);
    commit(&f, 1);
    commit(&f, 2);
    commit(&f, 3);
    let st = f.stats();
    assert_eq!(st.writable, 1);
    assert_eq!(st.pending_recycle, 0);
    assert!(st.has_current);
}

#[test]
fn current_frame_with_readers_is_not_recycled() {
    let f = fwd(2);
    commit(&f, 1);
    let r = f.get_any_for_reading().unwrap();
    f.finished_reading(r);
    // Released but still current: not eligible.
    assert_eq!(f.available_for_writing(), 1);
    assert!(f.stats().has_current);
}

#[test]
fn any_read_returns_duplicates() {
    let f = fwd(2);
    commit(&f, 5);
    let a = f.get_any_for_reading().unwrap();
    let b = f.get_any_for_reading().unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!(a.slot(), b.slot());
    assert_eq!(a.readers(), 2);
    f.finished_reading(a);
    assert_eq!(b.readers(), 1);
    f.finished_reading(b);
    assert_accounted(&f);
}

#[test]
fn failed_writing_counts_a_drop_and_keeps_current() {
    let f = fwd(2);
    commit(&f, 1);
    let w = f.get_for_writing().unwrap();
    assert_eq!(w.id(), 2);
    f.failed_writing(w);

    let st = f.stats();
    assert_eq!(st.dropped_in, 1);
    assert_eq!(st.writable, 1);
    let r = f.get_any_for_reading().unwrap();
    assert_eq!(r.id(), 1);
    f.finished_reading(r);
}

#[test]
fn out_of_order_commit_is_dropped() {
    let f = fwd(3);
    let older = f.get_for_writing().unwrap();
    let newer = f.get_for_writing().unwrap();
    assert_eq!(f.stats().in_writing, 2);
    assert_accounted(&f);

    f.finished_writing(newer);
    f.finished_writing(older);

    let st = f.stats();
    assert_eq!(st.dropped_in, 1);
    assert_eq!(st.writable, 2);
    let r = f.get_any_for_reading().unwrap();
    assert_eq!(r.id(), 2);
    f.finished_reading(r);
}

#[test]
fn liveness_expires_without_commits() {
    let f = fwd(2);
    let mut cursor = ReadCursor::new();
    commit(&f, 1);
    assert!(f.is_live());

    for _ in 0..10 {
        f.age(Duration::from_millis(100));
    }
    assert!(f.is_live(), "exactly one second is not over the limit");
    f.age(Duration::from_millis(20));
    assert!(!f.is_live());

    // A stale current frame exists but must not be handed out.
    assert!(f.stats().has_current);
    assert!(f.get_fresh_for_reading(&mut cursor).is_none());
    assert!(f.get_any_for_reading().is_none());

    commit(&f, 2);
    assert!(f.is_live());
    assert!(f.get_fresh_for_reading(&mut cursor).is_some_and(|r| {
        let ok = r.id() == 2;
        f.finished_reading(r);
        ok
    }));
}

#[test]
fn hold_mode_never_expires() {
    let f = fwd(2);
    f.set_hold(true);
    commit(&f, 1);
    f.age(Duration::from_secs(3600));
    assert!(f.is_live());
    let r = f.get_any_for_reading().unwrap();
    f.finished_reading(r);
}

#[test]
fn commit_resets_age() {
    let f = fwd(2);
    commit(&f, 1);
    f.age(Duration::from_millis(900));
    commit(&f, 2);
    f.age(Duration::from_millis(900));
    assert!(f.is_live());
}

#[test]
fn blocking_read_wakes_on_commit() {
    let f = fwd(3);
    let mut cursor = ReadCursor::new();
    commit(&f, 1);
    let r = f.get_fresh_for_reading(&mut cursor).unwrap();
    f.finished_reading(r);

    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut cursor = cursor;
            let r = f
                .blocking_get_for_reading_timeout(&mut cursor, Duration::from_secs(5))
                .expect("woken by the commit");
            let id = r.id();
            f.finished_reading(r);
            id
        });
        std::thread::sleep(Duration::from_millis(20));
        commit(&f, 2);
        assert_eq!(reader.join().unwrap(), 2);
    });
}

#[test]
fn blocking_read_returns_immediately_when_fresh() {
    let f = fwd(2);
    commit(&f, 1);
    let mut cursor = ReadCursor::new();
    let r = f.blocking_get_for_reading(&mut cursor).unwrap();
    assert_eq!(r.id(), 1);
    f.finished_reading(r);
}

#[test]
fn blocking_read_gives_up_on_liveness_loss() {
    let f = fwd(2);
    let mut cursor = ReadCursor::new();
    commit(&f, 1);
    let r = f.get_fresh_for_reading(&mut cursor).unwrap();
    f.finished_reading(r);

    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut cursor = cursor;
            f.blocking_get_for_reading_timeout(&mut cursor, Duration::from_secs(5))
                .is_none()
        });
        std::thread::sleep(Duration::from_millis(20));
        f.age(Duration::from_secs(2));
        assert!(reader.join().unwrap());
    });
}

#[test]
fn close_wakes_blocked_readers() {
    let f = fwd(2);
    std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut cursor = ReadCursor::new();
            f.blocking_get_for_reading(&mut cursor).is_none()
        });
        std::thread::sleep(Duration::from_millis(20));
        f.close();
        assert!(reader.join().unwrap());
    });
    assert!(f.is_closed());
}

#[test]
fn blocking_read_times_out() {
    let f = fwd(2);
    let mut cursor = ReadCursor::new();
    assert!(
        f.blocking_get_for_reading_timeout(&mut cursor, Duration::from_millis(10))
            .is_none()
    );
}

#[test]
#[should_panic(expected = "does not own it")]
fn releasing_into_the_wrong_forwarder_aborts() {
    let a = fwd(1);
    let b = fwd(1);
    commit(&a, 1);
    let r = a.get_any_for_reading().unwrap();
    b.finished_reading(r);
}

#[test]
#[should_panic(expected = "does not own it")]
fn committing_into_the_wrong_forwarder_aborts() {
    let a = fwd(1);
    let b = fwd(1);
    let w = a.get_for_writing().unwrap();
    b.finished_writing(w);
}

#[test]
fn short_payloads_keep_slot_capacity() {
    let info = FrameInfo {
        frame_type: FrameType::Yuv422p,
        width: 4,
        height: 2,
        pool_depth: 3,
    };
    let alloc = IndexedAllocator::new(|_slot: SlotId, info: &FrameInfo| {
        Box::new(vec![0u8; info.buf_size()]) as Box<dyn ExternalBuffer>
    });
    let f = FrameForwarder::new("capture", info, &alloc);
    let mut cursor = ReadCursor::new();

    for (cycle, delivered) in [16usize, 9, 16, 3, 0, 12].into_iter().enumerate() {
        let mut w = f.get_for_writing().unwrap();
        assert_eq!(w.capacity(), 16, "cycle {cycle}");
        assert_eq!(w.payload_len(), 16, "payload resets every cycle");
        w.set_payload_len(delivered).unwrap();
        f.finished_writing(w);

        let r = f.get_fresh_for_reading(&mut cursor).unwrap();
        assert_eq!(r.data().len(), delivered);
        f.finished_reading(r);
        assert_accounted(&f);
    }
}
