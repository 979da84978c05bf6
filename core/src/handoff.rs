//! Single slot channels between the completion interrupt, the acquisition
//! task and the display.
//!
//! Senders never wait: a value offered while the slot is still taken is
//! dropped, so a slow consumer only ever sees gaps, never stale backlogs.

use rtic_sync::channel::{Receiver, Sender, TrySendError};

use crate::transfer::BufferReadyEvent;
use crate::MeasurementEvent;

pub const HANDOFF_CAPACITY: usize = 1;

pub type ReadySender<'a> = Sender<'a, BufferReadyEvent, HANDOFF_CAPACITY>;
pub type ReadyReceiver<'a> = Receiver<'a, BufferReadyEvent, HANDOFF_CAPACITY>;
pub type MeasurementSender<'a> = Sender<'a, MeasurementEvent, HANDOFF_CAPACITY>;
pub type MeasurementReceiver<'a> = Receiver<'a, MeasurementEvent, HANDOFF_CAPACITY>;

/// Outcome of a non-blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Offer {
    Delivered,
    /// The previous value was not consumed yet, this one is gone.
    Dropped,
    /// Nobody is listening anymore.
    Disconnected,
}

/// Try to send `value` without blocking. Safe to call from interrupt context.
pub fn offer<T, const N: usize>(sender: &mut Sender<'_, T, N>, value: T) -> Offer {
    match sender.try_send(value) {
        Ok(()) => Offer::Delivered,
        Err(TrySendError::Full(_)) => Offer::Dropped,
        Err(_) => Offer::Disconnected,
    }
}
