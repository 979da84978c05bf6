//! Double buffered transfers from the converter into memory.
//!
//! The stream hardware writes one buffer while the other one is lent out to
//! the acquisition task. When a buffer fills up the hardware switches its
//! memory target on its own and raises the transfer complete interrupt, in
//! which [`TransferEngine::on_complete`] hands the finished buffer over.

use core::ops::Deref;
use core::slice;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::config::MAX_BATCH_SIZE;
use crate::handoff::{self, Offer, ReadySender};
use crate::{BufferId, Fault, RawSample, SampleBuffer};

/// Everything a stream needs to run peripheral to memory in ping-pong mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSetup {
    /// Fixed source address, the converter data register.
    pub source: u32,
    /// Memory targets 0 and 1, written with incrementing addresses.
    pub memory: [*mut RawSample; 2],
    /// Transfers per memory target.
    pub len: usize,
}

/// A peripheral to memory transfer stream in double buffer mode.
pub trait TransferStream {
    /// Program source, both memory targets and the transfer length, starting
    /// on memory target 0 with the transfer complete interrupt enabled.
    ///
    /// The stream is disabled first and all its pending flags are cleared.
    fn configure(&mut self, setup: &StreamSetup) -> Result<(), Fault>;

    /// Reload the transfer counter and point the stream back at memory
    /// target 0, so the next batch starts from the first sample of buffer A.
    /// Only called while the stream is disabled.
    fn rewind(&mut self);

    fn enable(&mut self);

    /// Stop transferring and wait, bounded, until the hardware agrees. The
    /// transfer counter and memory target stay where they stopped.
    fn disable(&mut self) -> Result<(), Fault>;

    fn is_transfer_complete(&self) -> bool;

    /// Clear every pending interrupt flag of the stream.
    fn clear_flags(&mut self);

    /// Memory target the hardware is writing right now.
    fn current_target(&self) -> BufferId;
}

/// Poll `done` at most `max_polls` times.
pub fn poll_until(max_polls: u32, mut done: impl FnMut() -> bool) -> Result<(), Fault> {
    if (0..max_polls).any(|_| done()) {
        Ok(())
    } else {
        Err(Fault::DisableTimeout)
    }
}

/// The two static sample buffers.
pub struct DoubleBuffer {
    memory: [*mut RawSample; 2],
    len: usize,
}

unsafe impl Send for DoubleBuffer {}

impl DoubleBuffer {
    pub fn new<const N: usize>(
        a: &'static mut SampleBuffer<N>,
        b: &'static mut SampleBuffer<N>,
    ) -> Self {
        assert!(N > 0, "Buffers can not be empty");
        assert!(
            N <= MAX_BATCH_SIZE,
            "The sum of a batch has to fit the accumulator"
        );

        Self {
            memory: [a.as_mut_ptr(), b.as_mut_ptr()],
            len: N,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.len
    }

    /// Only call while the stream is disabled.
    fn clear(&mut self) {
        for ptr in self.memory {
            unsafe { ptr.write_bytes(0, self.len) };
        }
    }

    fn grant(&self, buffer: BufferId) -> BufferReadyEvent {
        BufferReadyEvent {
            buffer,
            ptr: self.memory[buffer.index()],
            len: self.len,
        }
    }
}

/// A completely filled buffer, lent to the consumer until dropped.
///
/// The stream is busy with the other buffer meanwhile and only comes back to
/// this one a full batch later.
#[derive(Debug)]
pub struct BufferReadyEvent {
    buffer: BufferId,
    ptr: *const RawSample,
    len: usize,
}

unsafe impl Send for BufferReadyEvent {}

impl BufferReadyEvent {
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn sample_count(&self) -> usize {
        self.len
    }
}

impl Deref for BufferReadyEvent {
    type Target = [RawSample];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

pub struct TransferEngine<S> {
    stream: S,
    buffers: DoubleBuffer,
    running: bool,
}

impl<S: TransferStream> TransferEngine<S> {
    pub fn new(stream: S, buffers: DoubleBuffer) -> Self {
        Self {
            stream,
            buffers,
            running: false,
        }
    }

    /// Bind both buffers and the converter data register at `source`.
    pub fn configure(&mut self, source: u32) -> Result<(), Fault> {
        self.running = false;
        self.stream.configure(&StreamSetup {
            source,
            memory: self.buffers.memory,
            len: self.buffers.len,
        })?;

        debug!(
            "Transfer engine configured, {} samples per buffer",
            self.buffers.len
        );
        Ok(())
    }

    /// Start a fresh batch in buffer A with both buffers zeroed. Does
    /// nothing while running.
    pub fn enable(&mut self) {
        if self.running {
            return;
        }

        // A stop halfway through a batch leaves the stream mid buffer
        self.stream.rewind();
        self.stream.clear_flags();

        self.buffers.clear();
        compiler_fence(Ordering::SeqCst);
        self.stream.enable();
        self.running = true;
    }

    /// Stop transferring, discarding a partially filled buffer.
    pub fn disable(&mut self) -> Result<(), Fault> {
        self.stream.disable()?;
        self.running = false;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn batch_size(&self) -> usize {
        self.buffers.batch_size()
    }

    /// Transfer complete interrupt handler.
    ///
    /// Returns `None` when no transfer completed, otherwise what happened to
    /// the buffer ready event.
    pub fn on_complete(&mut self, ready: &mut ReadySender<'_>) -> Option<Offer> {
        if !self.stream.is_transfer_complete() {
            return None;
        }

        // The hardware already moved on to the other memory target
        let finished = self.stream.current_target().other();
        self.stream.clear_flags();
        compiler_fence(Ordering::SeqCst);

        let offer = handoff::offer(ready, self.buffers.grant(finished));
        match offer {
            Offer::Delivered => trace!("Buffer {} ready", finished),
            Offer::Dropped => trace!("Buffer {} dropped, consumer is behind", finished),
            Offer::Disconnected => warn!("Buffer {} has no consumer", finished),
        }

        Some(offer)
    }

    #[cfg(test)]
    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::HANDOFF_CAPACITY;
    use crate::sim::{double_buffer, SimStream};
    use rtic_sync::channel::Channel;

    const LEN: usize = 16;
    const SOURCE: u32 = 0x4001_204C;

    fn engine(buffers: DoubleBuffer) -> TransferEngine<SimStream> {
        let mut engine = TransferEngine::new(SimStream::new(), buffers);
        engine.configure(SOURCE).unwrap();
        engine
    }

    #[test]
    fn configure_binds_buffers() {
        let mut engine = engine(double_buffer!(LEN));
        let setup = engine.stream_mut().setup().unwrap();

        assert_eq!(setup.source, SOURCE);
        assert_eq!(setup.len, LEN);
        assert_ne!(setup.memory[0], setup.memory[1]);
        assert_eq!(engine.stream_mut().current_target(), BufferId::A);
        assert!(!engine.is_running());
    }

    #[test]
    fn enable_clears_stale_data() {
        let mut engine = engine(double_buffer!(LEN));
        let mut channel = Channel::<BufferReadyEvent, HANDOFF_CAPACITY>::new();
        let (mut tx, mut rx) = channel.split();

        engine.enable();
        assert!(engine.is_running());

        // Fill A so its contents become visible, B has not been touched yet
        engine.stream_mut().transfer_all((0..LEN).map(|_| 7));
        assert_eq!(engine.on_complete(&mut tx), Some(Offer::Delivered));
        let a = rx.try_recv().ok().unwrap();
        assert!(a.iter().all(|&s| s == 7));
        drop(a);

        // Half of B, then stop: the partial batch never shows up
        engine.stream_mut().transfer_all((0..LEN / 2).map(|_| 9));
        engine.disable().unwrap();
        assert_eq!(engine.on_complete(&mut tx), None);
        assert!(rx.try_recv().is_err());

        // Enabling again zeroes both buffers before anything is written
        engine.enable();
        let setup = engine.stream_mut().setup().unwrap();
        for ptr in setup.memory {
            let buffer = unsafe { slice::from_raw_parts(ptr, LEN) };
            assert!(buffer.iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn enable_twice_keeps_data() {
        let mut engine = engine(double_buffer!(LEN));
        engine.enable();
        engine.stream_mut().transfer_all((0..3).map(|_| 1));
        engine.enable();

        let setup = engine.stream_mut().setup().unwrap();
        let a = unsafe { slice::from_raw_parts(setup.memory[0], LEN) };
        assert_eq!(&a[..4], &[1, 1, 1, 0]);
    }

    #[test]
    fn restart_discards_partial_batch() {
        let mut engine = engine(double_buffer!(LEN));
        let mut channel = Channel::<BufferReadyEvent, HANDOFF_CAPACITY>::new();
        let (mut tx, mut rx) = channel.split();
        engine.enable();

        // Stopped halfway through B
        engine.stream_mut().transfer_all((0..LEN).map(|_| 1));
        assert_eq!(engine.on_complete(&mut tx), Some(Offer::Delivered));
        drop(rx.try_recv().ok().unwrap());
        engine.stream_mut().transfer_all((0..LEN / 2).map(|_| 9));
        engine.disable().unwrap();

        engine.enable();
        assert_eq!(engine.stream_mut().current_target(), BufferId::A);

        // The old half batch does not count towards the new one
        engine.stream_mut().transfer_all((0..LEN / 2).map(|_| 5));
        assert_eq!(engine.on_complete(&mut tx), None);

        engine.stream_mut().transfer_all((0..LEN / 2).map(|_| 5));
        assert_eq!(engine.on_complete(&mut tx), Some(Offer::Delivered));
        let event = rx.try_recv().ok().unwrap();
        assert_eq!(event.buffer(), BufferId::A);
        assert_eq!(event.sample_count(), LEN);
        assert!(event.iter().all(|&s| s == 5));
    }

    #[test]
    fn restart_clears_pending_completion() {
        let mut engine = engine(double_buffer!(LEN));
        let mut channel = Channel::<BufferReadyEvent, HANDOFF_CAPACITY>::new();
        let (mut tx, mut rx) = channel.split();
        engine.enable();

        // A completes but is never handed over before the stop
        engine.stream_mut().transfer_all((0..LEN).map(|_| 1));
        engine.disable().unwrap();
        engine.enable();

        assert_eq!(engine.on_complete(&mut tx), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn buffers_alternate() {
        let mut engine = engine(double_buffer!(LEN));
        let mut channel = Channel::<BufferReadyEvent, HANDOFF_CAPACITY>::new();
        let (mut tx, mut rx) = channel.split();
        engine.enable();

        let mut expected = BufferId::A;
        for batch in 0..10u16 {
            engine
                .stream_mut()
                .transfer_all((0..LEN as u16).map(|i| batch * 100 + i));
            assert_eq!(engine.on_complete(&mut tx), Some(Offer::Delivered));

            let event = rx.try_recv().ok().unwrap();
            assert_eq!(event.buffer(), expected);
            assert_eq!(event.sample_count(), LEN);
            assert_eq!(event[0], batch * 100);
            assert_eq!(event[LEN - 1], batch * 100 + LEN as u16 - 1);

            expected = expected.other();
        }
    }

    #[test]
    fn full_channel_drops_event() {
        let mut engine = engine(double_buffer!(LEN));
        let mut channel = Channel::<BufferReadyEvent, HANDOFF_CAPACITY>::new();
        let (mut tx, mut rx) = channel.split();
        engine.enable();

        engine.stream_mut().transfer_all((0..LEN).map(|_| 1));
        assert_eq!(engine.on_complete(&mut tx), Some(Offer::Delivered));

        engine.stream_mut().transfer_all((0..LEN).map(|_| 2));
        assert_eq!(engine.on_complete(&mut tx), Some(Offer::Dropped));

        // The completion flag was cleared even though the event was dropped
        assert!(!engine.stream_mut().is_transfer_complete());
        assert_eq!(engine.on_complete(&mut tx), None);

        let event = rx.try_recv().ok().unwrap();
        assert_eq!(event.buffer(), BufferId::A);
        assert!(event.iter().all(|&s| s == 1));
        assert!(rx.try_recv().is_err());
        drop(event);

        // B was skipped, the next completion is A with fresh data
        engine.stream_mut().transfer_all((0..LEN).map(|_| 3));
        assert_eq!(engine.on_complete(&mut tx), Some(Offer::Delivered));
        let event = rx.try_recv().ok().unwrap();
        assert_eq!(event.buffer(), BufferId::A);
        assert!(event.iter().all(|&s| s == 3));
    }

    #[test]
    fn spurious_interrupt_is_ignored() {
        let mut engine = engine(double_buffer!(LEN));
        let mut channel = Channel::<BufferReadyEvent, HANDOFF_CAPACITY>::new();
        let (mut tx, mut rx) = channel.split();
        engine.enable();

        engine.stream_mut().transfer_all((0..LEN - 1).map(|_| 1));
        assert_eq!(engine.on_complete(&mut tx), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disable_is_idempotent() {
        let mut engine = engine(double_buffer!(LEN));
        engine.enable();

        engine.disable().unwrap();
        let once = (engine.is_running(), engine.stream_mut().is_enabled());
        engine.disable().unwrap();
        let twice = (engine.is_running(), engine.stream_mut().is_enabled());

        assert_eq!(once, (false, false));
        assert_eq!(once, twice);
    }

    #[test]
    fn stuck_stream_times_out() {
        let mut engine = engine(double_buffer!(LEN));
        engine.enable();
        engine.stream_mut().set_stuck(true);

        assert_eq!(engine.disable(), Err(Fault::DisableTimeout));
        // Still considered running, nothing was stopped
        assert!(engine.is_running());
    }

    #[test]
    fn poll_until_is_bounded() {
        let mut polls = 0;
        assert_eq!(
            poll_until(5, || {
                polls += 1;
                false
            }),
            Err(Fault::DisableTimeout)
        );
        assert_eq!(polls, 5);

        let mut polls = 0;
        assert_eq!(
            poll_until(5, || {
                polls += 1;
                polls == 3
            }),
            Ok(())
        );
        assert_eq!(polls, 3);
    }
}
