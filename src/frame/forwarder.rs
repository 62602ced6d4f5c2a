//! Single-writer / multi-reader frame exchange over a fixed pool.
//!
//! The forwarder is built for live streaming: a writer that finds the pool empty drops its
//! frame instead of waiting, and readers only ever see the most recent commit. Nothing is
//! queued for later consumption.
//!
//! A frame is always in exactly one of these places:
//!
//! - the writable pool (`bin`),
//! - the writer's hands (between `get_for_writing` and `finished_writing`/`failed_writing`),
//! - the current slot (latest commit, possibly shared with readers),
//! - the retired list (superseded, waiting for its last reader to call `finished_reading`).

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    foundation::error::protocol_violation,
    frame::{
        alloc::FrameAllocator,
        buffer::{Frame, FrameInfo},
    },
};

/// Time without a commit after which a non-holding stream is considered dead.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Freshness position of one reader.
///
/// Every consumer keeps its own cursor, so two consumers of the same stream each get to see
/// every commit once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadCursor {
    last_id: u64,
}

impl ReadCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// ID of the last frame this cursor received. `0` before the first read.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }
}

/// A frame checked out for writing. Return it with `finished_writing` or `failed_writing`.
#[must_use = "a frame taken for writing must be returned to its forwarder"]
#[derive(Debug)]
pub struct WriteFrame {
    frame: Frame,
}

impl Deref for WriteFrame {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}

impl DerefMut for WriteFrame {
    fn deref_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

/// Shared read access to a committed frame. Return it with `finished_reading`.
#[must_use = "a frame taken for reading must be released with finished_reading"]
#[derive(Debug)]
pub struct ReadFrame {
    frame: Arc<Frame>,
}

impl Deref for ReadFrame {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}

/// Point-in-time view of a forwarder's bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub pool_depth: usize,
    pub writable: usize,
    pub in_writing: usize,
    pub pending_recycle: usize,
    pub has_current: bool,
    pub live: bool,
    pub last_frame_id: u64,
    pub forwarded: u64,
    pub dropped_in: u64,
    pub dropped_out: u64,
}

impl ForwarderStats {
    /// Frames accounted for across every state. Always equals `pool_depth`.
    pub fn accounted(&self) -> usize {
        self.writable + self.in_writing + self.pending_recycle + usize::from(self.has_current)
    }
}

#[derive(Debug)]
struct State {
    bin: Vec<Frame>,
    current: Option<Arc<Frame>>,
    retired: Vec<Arc<Frame>>,
    in_writing: usize,
    last_frame_id: u64,
    live: bool,
    hold: bool,
    closed: bool,
    age: Duration,
    liveness_epoch: u64,
    forwarded: u64,
    dropped_in: u64,
    dropped_out: u64,
}

/// Synchronises one writer and any number of readers over a fixed pool of frames.
#[derive(Debug)]
pub struct FrameForwarder {
    name: String,
    info: FrameInfo,
    token: u64,
    state: Mutex<State>,
    fresh: Condvar,
}

impl FrameForwarder {
    /// Allocate `info.pool_depth` frames up front. The pool never grows or shrinks afterwards.
    pub fn new(name: impl Into<String>, info: FrameInfo, alloc: &dyn FrameAllocator) -> Self {
        let name = name.into();
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let depth = info.pool_depth;

        let mut bin = Vec::with_capacity(depth);
        for _ in 0..depth {
            let mut frame = alloc.new_frame(&info);
            frame.set_owner(token);
            bin.push(frame);
        }

        tracing::debug!(
            stream = %name,
            frame_type = %info.frame_type,
            width = info.width,
            height = info.height,
            depth,
            "frame pool allocated"
        );

        Self {
            name,
            info,
            token,
            state: Mutex::new(State {
                bin,
                current: None,
                retired: Vec::with_capacity(depth),
                in_writing: 0,
                last_frame_id: 0,
                live: false,
                hold: false,
                closed: false,
                age: Duration::ZERO,
                liveness_epoch: 0,
                forwarded: 0,
                dropped_in: 0,
                dropped_out: 0,
            }),
            fresh: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current frame, if it is newer than what `cursor` has seen and the stream is live.
    pub fn get_fresh_for_reading(&self, cursor: &mut ReadCursor) -> Option<ReadFrame> {
        let st = self.lock();
        Self::take_fresh(&st, cursor)
    }

    fn take_fresh(st: &State, cursor: &mut ReadCursor) -> Option<ReadFrame> {
        if !st.live {
            return None;
        }
        let current = st.current.as_ref()?;
        if current.id() <= cursor.last_id {
            return None;
        }
        current.acquire_reader();
        cursor.last_id = current.id();
        Some(ReadFrame {
            frame: Arc::clone(current),
        })
    }

    /// Like [`Self::get_fresh_for_reading`], but wait for the next commit.
    ///
    /// Returns `None` when the stream loses liveness while waiting or the forwarder is closed.
    pub fn blocking_get_for_reading(&self, cursor: &mut ReadCursor) -> Option<ReadFrame> {
        self.wait_fresh(cursor, None)
    }

    /// Like [`Self::blocking_get_for_reading`], giving up after `timeout`.
    pub fn blocking_get_for_reading_timeout(
        &self,
        cursor: &mut ReadCursor,
        timeout: Duration,
    ) -> Option<ReadFrame> {
        self.wait_fresh(cursor, Some(Instant::now() + timeout))
    }

    fn wait_fresh(&self, cursor: &mut ReadCursor, deadline: Option<Instant>) -> Option<ReadFrame> {
        let mut st = self.lock();
        let epoch = st.liveness_epoch;
        loop {
            if st.closed || st.liveness_epoch != epoch {
                return None;
            }
            if let Some(frame) = Self::take_fresh(&st, cursor) {
                return Some(frame);
            }
            st = match deadline {
                None => self.fresh.wait(st).unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.fresh
                        .wait_timeout(st, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }

    /// The current frame regardless of freshness, for consumers that must keep sinking
    /// duplicates rather than stall.
    pub fn get_any_for_reading(&self) -> Option<ReadFrame> {
        let st = self.lock();
        if !st.live {
            return None;
        }
        let current = st.current.as_ref()?;
        current.acquire_reader();
        Some(ReadFrame {
            frame: Arc::clone(current),
        })
    }

    /// Release a frame obtained from one of the `get_*_for_reading` calls.
    ///
    /// The last reader of a superseded frame puts it back into the writable pool.
    pub fn finished_reading(&self, frame: ReadFrame) {
        let frame = frame.frame;
        if frame.owner() != self.token {
            protocol_violation(&self.name, "frame released to a forwarder that does not own it");
        }

        let mut st = self.lock();
        let remaining = frame.release_reader(&self.name);
        if remaining > 0 || !frame.is_marked_for_recycling() {
            // Drop our reference while still holding the lock so the last reader's
            // try_unwrap below never races with it.
            drop(frame);
            return;
        }

        let slot = frame.slot();
        drop(frame);
        let Some(pos) = st.retired.iter().position(|f| f.slot() == slot) else {
            protocol_violation(&self.name, "frame marked for recycling is not retired");
        };
        let retired = st.retired.swap_remove(pos);
        match Arc::try_unwrap(retired) {
            Ok(frame) => self.recycle(&mut st, frame),
            Err(_) => protocol_violation(&self.name, "recycled frame is still referenced"),
        }
    }

    /// Take a frame out of the writable pool and stamp it with the next ID.
    ///
    /// `None` means the pool is exhausted: drop this cycle's data, do not retry-block.
    pub fn get_for_writing(&self) -> Option<WriteFrame> {
        let mut st = self.lock();
        let Some(mut frame) = st.bin.pop() else {
            st.dropped_out += 1;
            let dropped = st.dropped_out;
            drop(st);
            tracing::debug!(stream = %self.name, dropped, "frame pool exhausted, dropping");
            return None;
        };
        st.last_frame_id += 1;
        frame.set_id(st.last_frame_id);
        st.in_writing += 1;
        drop(st);

        frame.reset_for_writing();
        Some(WriteFrame { frame })
    }

    /// Publish `frame` as the current frame and wake blocked readers.
    ///
    /// The previous current frame goes straight back to the pool if nobody reads it, otherwise
    /// it is retired until its last reader lets go. A frame older than the current one is
    /// dropped so readers never see IDs go backwards.
    pub fn finished_writing(&self, frame: WriteFrame) {
        let frame = frame.frame;
        if frame.owner() != self.token {
            protocol_violation(&self.name, "frame committed to a forwarder that does not own it");
        }
        let frame = Arc::new(frame);

        let mut st = self.lock();
        self.leave_writing(&mut st);

        if st.current.as_ref().is_some_and(|cur| frame.id() < cur.id()) {
            st.dropped_in += 1;
            match Arc::try_unwrap(frame) {
                Ok(frame) => self.recycle(&mut st, frame),
                Err(_) => protocol_violation(&self.name, "uncommitted frame is shared"),
            }
            return;
        }

        if let Some(prev) = st.current.take() {
            if prev.readers() == 0 {
                match Arc::try_unwrap(prev) {
                    Ok(prev) => self.recycle(&mut st, prev),
                    Err(_) => protocol_violation(&self.name, "unread frame is still referenced"),
                }
            } else {
                prev.mark_for_recycling(true);
                st.retired.push(prev);
            }
        }

        st.current = Some(frame);
        st.forwarded += 1;
        st.age = Duration::ZERO;
        st.live = true;
        drop(st);
        self.fresh.notify_all();
    }

    /// Return a frame to the pool without publishing it.
    pub fn failed_writing(&self, frame: WriteFrame) {
        let frame = frame.frame;
        if frame.owner() != self.token {
            protocol_violation(&self.name, "frame returned to a forwarder that does not own it");
        }
        let mut st = self.lock();
        self.leave_writing(&mut st);
        st.dropped_in += 1;
        self.recycle(&mut st, frame);
    }

    fn leave_writing(&self, st: &mut State) {
        match st.in_writing.checked_sub(1) {
            Some(n) => st.in_writing = n,
            None => protocol_violation(&self.name, "more frames returned than extracted"),
        }
    }

    fn recycle(&self, st: &mut State, frame: Frame) {
        if st.bin.len() >= self.info.pool_depth {
            protocol_violation(&self.name, "more frames returned than extracted");
        }
        frame.mark_for_recycling(false);
        st.bin.push(frame);
    }

    /// Advance the time since the last commit; past [`LIVENESS_TIMEOUT`] the stream goes dead
    /// unless it is in hold mode.
    pub fn age(&self, dt: Duration) {
        let mut st = self.lock();
        st.age = st.age.saturating_add(dt);
        if st.hold || !st.live || st.age <= LIVENESS_TIMEOUT {
            return;
        }
        st.live = false;
        st.liveness_epoch += 1;
        drop(st);
        tracing::info!(stream = %self.name, "no frames for over {LIVENESS_TIMEOUT:?}, marking stream dead");
        self.fresh.notify_all();
    }

    /// Keep the current frame valid forever (still images).
    pub fn set_hold(&self, hold: bool) {
        self.lock().hold = hold;
    }

    pub fn is_live(&self) -> bool {
        self.lock().live
    }

    /// Wake every blocked reader and make further blocking reads return immediately.
    pub fn close(&self) {
        self.lock().closed = true;
        self.fresh.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn available_for_writing(&self) -> usize {
        self.lock().bin.len()
    }

    pub fn stats(&self) -> ForwarderStats {
        let st = self.lock();
        ForwarderStats {
            pool_depth: self.info.pool_depth,
            writable: st.bin.len(),
            in_writing: st.in_writing,
            pending_recycle: st.retired.len(),
            has_current: st.current.is_some(),
            live: st.live,
            last_frame_id: st.last_frame_id,
            forwarded: st.forwarded,
            dropped_in: st.dropped_in,
            dropped_out: st.dropped_out,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frame/forwarder.rs"]
mod tests;
