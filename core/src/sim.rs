//! Host stand-ins for the converter and the ping-pong transfer stream.

use crate::config::AcquisitionConfig;
use crate::converter::Converter;
use crate::transfer::{poll_until, StreamSetup, TransferStream};
use crate::{BufferId, Fault, RawSample};

/// Two fresh static buffers filled with garbage, wrapped in a
/// [`DoubleBuffer`](crate::transfer::DoubleBuffer).
///
/// Every expansion owns its own statics, so use it once per test.
macro_rules! double_buffer {
    ($len:expr) => {{
        static BUFFER_A: static_cell::StaticCell<$crate::SampleBuffer<{ $len }>> =
            static_cell::StaticCell::new();
        static BUFFER_B: static_cell::StaticCell<$crate::SampleBuffer<{ $len }>> =
            static_cell::StaticCell::new();

        $crate::transfer::DoubleBuffer::new(
            BUFFER_A.init([0x5A5A; $len]),
            BUFFER_B.init([0xA5A5; $len]),
        )
    }};
}
pub(crate) use double_buffer;

pub const SIM_DATA_ADDRESS: u32 = 0x4001_204C;

#[derive(Debug, Default)]
pub struct SimConverter {
    pub config: Option<AcquisitionConfig>,
    pub running: bool,
    pub triggers: usize,
}

impl Converter for SimConverter {
    fn configure(&mut self, config: &AcquisitionConfig) {
        self.config = Some(*config);
    }

    fn start(&mut self) {
        self.running = true;
        self.triggers += 1;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn data_address(&self) -> u32 {
        SIM_DATA_ADDRESS
    }
}

/// Behaves like a double buffer mode stream: writes through the configured
/// memory pointers and flips its target when one fills up.
#[derive(Debug)]
pub struct SimStream {
    setup: Option<StreamSetup>,
    enabled: bool,
    stuck: bool,
    target: BufferId,
    cursor: usize,
    complete: bool,
}

impl SimStream {
    const DISABLE_POLLS: u32 = 8;

    pub fn new() -> Self {
        Self {
            setup: None,
            enabled: false,
            stuck: false,
            target: BufferId::A,
            cursor: 0,
            complete: false,
        }
    }

    pub fn setup(&self) -> Option<StreamSetup> {
        self.setup
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A stuck stream ignores requests to disable.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// One transfer request from the converter.
    pub fn transfer(&mut self, sample: RawSample) {
        if !self.enabled {
            return;
        }
        let setup = self.setup.expect("Stream has to be configured");

        unsafe {
            setup.memory[self.target.index()]
                .add(self.cursor)
                .write_volatile(sample)
        };

        self.cursor += 1;
        if self.cursor == setup.len {
            self.cursor = 0;
            self.target = self.target.other();
            self.complete = true;
        }
    }

    pub fn transfer_all(&mut self, samples: impl IntoIterator<Item = RawSample>) {
        for sample in samples {
            self.transfer(sample);
        }
    }
}

impl TransferStream for SimStream {
    fn configure(&mut self, setup: &StreamSetup) -> Result<(), Fault> {
        self.disable()?;
        self.clear_flags();

        self.setup = Some(*setup);
        self.rewind();
        Ok(())
    }

    fn rewind(&mut self) {
        self.target = BufferId::A;
        self.cursor = 0;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    /// Keeps its position within the batch, like the hardware counter.
    fn disable(&mut self) -> Result<(), Fault> {
        if !self.stuck {
            self.enabled = false;
        }

        poll_until(Self::DISABLE_POLLS, || !self.enabled)
    }

    fn is_transfer_complete(&self) -> bool {
        self.complete
    }

    fn clear_flags(&mut self) {
        self.complete = false;
    }

    fn current_target(&self) -> BufferId {
        self.target
    }
}
