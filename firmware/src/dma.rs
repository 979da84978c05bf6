use hal::{
    pac,
    rcc::{self, Enable},
};
use stm32f7xx_hal as hal;

use voltmeter_core::{
    transfer::{poll_until, StreamSetup},
    BufferId, Fault, TransferStream,
};

/// DMA2 stream 0, channel 0: the ADC1 request line.
pub struct Dma2Stream0 {
    dma2: pac::DMA2,
    /// Transfers per memory target, reloaded on every rewind
    len: u16,
}

impl Dma2Stream0 {
    const DISABLE_POLLS: u32 = 10_000;

    pub fn new(dma2: pac::DMA2, ahb1: &mut rcc::AHB1) -> Self {
        <pac::DMA2 as Enable>::enable(ahb1);
        Self { dma2, len: 0 }
    }
}

impl TransferStream for Dma2Stream0 {
    /// Configure DMA2 Stream 0 to read 16-bit conversions from ADC1
    /// and write them into both buffers in double-buffer mode
    fn configure(&mut self, setup: &StreamSetup) -> Result<(), Fault> {
        let len = u16::try_from(setup.len).map_err(|_| Fault::BatchTooLong)?;

        // The stream ignores writes to its configuration while enabled
        self.disable()?;
        self.clear_flags();

        let stream = &self.dma2.st[0];
        stream.cr.modify(|_, w| {
            // Select channel 0 (ADC1)
            w.chsel()
                .bits(0)
                // Enable Double-buffer mode
                .dbm()
                .enabled()
                // Circular mode is implied by double-buffer mode
                .circ()
                .disabled()
                // Set data size to 16 bits at memory side
                .msize()
                .bits16()
                // Set data size to 16 bits at peripheral side
                .psize()
                .bits16()
                // Increment memory pointer after each read
                .minc()
                .incremented()
                // Do not increment peripheral data pointer
                .pinc()
                .fixed()
                // Write from peripheral to memory
                .dir()
                .peripheral_to_memory()
                .pfctrl()
                .dma()
                // Enable Transfer Complete Interrupt
                .tcie()
                .enabled()
                .htie()
                .disabled()
                .teie()
                .disabled()
                .dmeie()
                .disabled()
                // Select Memory 0 to start
                .ct()
                .memory0()
        });

        // Set peripheral address to ADC1 data register
        stream.par.write(|w| unsafe { w.pa().bits(setup.source) });

        // Memory 0 is buffer A, memory 1 is buffer B
        stream
            .m0ar
            .write(|w| unsafe { w.m0a().bits(setup.memory[0] as u32) });
        stream
            .m1ar
            .write(|w| unsafe { w.m1a().bits(setup.memory[1] as u32) });

        self.len = len;
        self.rewind();

        Ok(())
    }

    /// NDTR and CT keep their values while the stream is disabled, both have
    /// to be reset by hand before the next enable
    fn rewind(&mut self) {
        let stream = &self.dma2.st[0];

        // Conversions per buffer
        stream.ndtr.modify(|_, w| w.ndt().bits(self.len));
        stream.cr.modify(|_, w| w.ct().memory0());
    }

    fn enable(&mut self) {
        self.dma2.st[0].cr.modify(|_, w| w.en().enabled());
    }

    fn disable(&mut self) -> Result<(), Fault> {
        let stream = &self.dma2.st[0];
        stream.cr.modify(|_, w| w.en().disabled());

        // EN only reads back as cleared once the current transfer is done
        poll_until(Self::DISABLE_POLLS, || stream.cr.read().en().bit_is_clear())
    }

    fn is_transfer_complete(&self) -> bool {
        self.dma2.lisr.read().tcif0().bit_is_set()
    }

    fn clear_flags(&mut self) {
        self.dma2.lifcr.write(|w| {
            w.ctcif0()
                .set_bit()
                .chtif0()
                .set_bit()
                .cteif0()
                .set_bit()
                .cdmeif0()
                .set_bit()
                .cfeif0()
                .set_bit()
        });
    }

    /// CT names the memory target being written right now
    fn current_target(&self) -> BufferId {
        if self.dma2.st[0].cr.read().ct().bit_is_set() {
            BufferId::B
        } else {
            BufferId::A
        }
    }
}
