#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod config;
pub mod converter;
pub mod display;
pub mod frontend;
pub mod handoff;
pub mod transfer;

#[cfg(test)]
mod sim;

pub use acquisition::Acquisition;
pub use config::{AcquisitionConfig, BATCH_SIZE};
pub use converter::Converter;
pub use frontend::Frontend;
pub use handoff::{Offer, HANDOFF_CAPACITY};
pub use transfer::{BufferReadyEvent, DoubleBuffer, TransferEngine, TransferStream};

/// One converter reading, right aligned.
pub type RawSample = u16;

/// Destination memory for one batch of transfers.
pub type SampleBuffer<const N: usize> = [RawSample; N];

/// Identifies one of the two static sample buffers.
///
/// `A` is the transfer engine's memory target 0 and `B` its memory target 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    pub const fn other(self) -> Self {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
}

/// One reduced buffer, as handed to the display.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementEvent {
    /// Integer mean of the raw samples.
    pub average: u32,
    /// Mean input voltage in volts.
    pub voltage: f32,
    /// Number of measurements produced before this one. Wraps on overflow.
    pub sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// The transfer stream kept its enable bit set after being disabled.
    DisableTimeout,
    /// The batch does not fit the stream's transfer counter.
    BatchTooLong,
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Fault::DisableTimeout => f.write_str("transfer stream did not stop in time"),
            Fault::BatchTooLong => f.write_str("batch does not fit the transfer counter"),
        }
    }
}
