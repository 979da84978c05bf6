use hal::{
    pac,
    rcc::{self, Enable, Reset},
};
use stm32f7xx_hal as hal;

use voltmeter_core::{
    config::{Resolution, SampleTime},
    AcquisitionConfig, Converter,
};

/// ADC1 converting a single channel back to back, read out by DMA2.
pub struct Adc1 {
    adc1: pac::ADC1,
    common: pac::ADC_COMMON,
}

impl Adc1 {
    /// ADCCLK = PCLK2 / PRESCALER
    pub const PRESCALER: u32 = 8;
    // Covers the 3 us power up time at 216 MHz
    const STABILIZATION_CYCLES: u32 = 1_000;

    pub fn new(adc1: pac::ADC1, common: pac::ADC_COMMON, apb2: &mut rcc::APB2) -> Self {
        <pac::ADC1 as Enable>::enable(apb2);
        // Power down ADC1
        adc1.cr2.modify(|_, w| w.adon().clear_bit());
        <pac::ADC1 as Reset>::reset(apb2);

        Self { adc1, common }
    }

    pub const fn clock_hz(pclk2_hz: u32) -> u32 {
        pclk2_hz / Self::PRESCALER
    }

    fn resolution_bits(resolution: Resolution) -> u8 {
        match resolution {
            Resolution::Bits12 => 0b00,
            Resolution::Bits10 => 0b01,
            Resolution::Bits8 => 0b10,
            Resolution::Bits6 => 0b11,
        }
    }

    fn sample_time_bits(sample_time: SampleTime) -> u32 {
        match sample_time {
            SampleTime::Cycles3 => 0b000,
            SampleTime::Cycles15 => 0b001,
            SampleTime::Cycles28 => 0b010,
            SampleTime::Cycles56 => 0b011,
            SampleTime::Cycles84 => 0b100,
            SampleTime::Cycles112 => 0b101,
            SampleTime::Cycles144 => 0b110,
            SampleTime::Cycles480 => 0b111,
        }
    }

    /// SMPR2 holds channels 0 to 9, SMPR1 the rest, three bits each
    fn set_sample_time(&self, channel: u8, sample_time: SampleTime) {
        let bits = Self::sample_time_bits(sample_time);

        if channel < 10 {
            let shift = 3 * u32::from(channel);
            self.adc1.smpr2.modify(|r, w| unsafe {
                w.bits((r.bits() & !(0b111 << shift)) | (bits << shift))
            });
        } else {
            let shift = 3 * u32::from(channel - 10);
            self.adc1.smpr1.modify(|r, w| unsafe {
                w.bits((r.bits() & !(0b111 << shift)) | (bits << shift))
            });
        }
    }
}

impl Converter for Adc1 {
    /// Configure ADC1 for continuous conversion of one channel, with every
    /// result handed to DMA for as long as the DMA keeps up
    fn configure(&mut self, config: &AcquisitionConfig) {
        let adc1 = &self.adc1;
        adc1.cr2.modify(|_, w| w.adon().clear_bit());

        // ADCCLK = PCLK2 / 8
        self.common
            .ccr
            .modify(|_, w| unsafe { w.adcpre().bits(0b11) });

        // Single channel, no scan and no discontinuous mode
        adc1.cr1.modify(|_, w| {
            w.res()
                .bits(Self::resolution_bits(config.resolution))
                .scan()
                .clear_bit()
                .discen()
                .clear_bit()
                .eocie()
                .disabled()
        });

        // Continuous conversion, triggered once by software
        adc1.cr2
            .modify(|_, w| w.cont().continuous().exten().disabled());

        // Keep issuing DMA requests after the last transfer
        adc1.cr2.modify(|_, w| w.dma().enabled().dds().continuous());

        // Sequence of one conversion
        adc1.sqr1.modify(|_, w| unsafe { w.l().bits(0) });
        adc1.sqr3
            .modify(|_, w| unsafe { w.sq1().bits(config.channel) });

        self.set_sample_time(config.channel, config.sample_time);
    }

    fn start(&mut self) {
        let adc1 = &self.adc1;

        // An overrun stops DMA requests until it is cleared
        adc1.sr.modify(|_, w| w.ovr().clear_bit());

        // Power up ADC1
        adc1.cr2.modify(|_, w| w.adon().enabled());
        cortex_m::asm::delay(Self::STABILIZATION_CYCLES);

        adc1.cr2.modify(|_, w| w.swstart().set_bit());
    }

    fn stop(&mut self) {
        self.adc1.cr2.modify(|_, w| w.adon().clear_bit());
    }

    fn data_address(&self) -> u32 {
        self.adc1.dr.as_ptr() as u32
    }
}
