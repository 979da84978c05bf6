use crate::RawSample;

/// Number of samples reduced into one measurement.
pub const BATCH_SIZE: usize = 1000;

/// Largest code any supported resolution can produce.
pub const MAX_SAMPLE: RawSample = Resolution::Bits12.full_scale();

/// Longest batch whose sum of samples still fits the `u32` accumulator.
pub const MAX_BATCH_SIZE: usize = (u32::MAX / MAX_SAMPLE as u32) as usize;

const _: () = assert!(BATCH_SIZE <= MAX_BATCH_SIZE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits12,
    Bits10,
    Bits8,
    Bits6,
}

impl Resolution {
    pub const fn bits(self) -> u32 {
        match self {
            Resolution::Bits12 => 12,
            Resolution::Bits10 => 10,
            Resolution::Bits8 => 8,
            Resolution::Bits6 => 6,
        }
    }

    /// Number of distinct codes, `2^bits`.
    pub const fn code_range(self) -> u32 {
        1 << self.bits()
    }

    /// Highest code the converter reports, `2^bits - 1`.
    pub const fn full_scale(self) -> RawSample {
        (self.code_range() - 1) as RawSample
    }
}

/// Sample-and-hold duration in converter clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleTime {
    Cycles3,
    Cycles15,
    Cycles28,
    Cycles56,
    Cycles84,
    Cycles112,
    Cycles144,
    Cycles480,
}

impl SampleTime {
    pub const fn cycles(self) -> u32 {
        match self {
            SampleTime::Cycles3 => 3,
            SampleTime::Cycles15 => 15,
            SampleTime::Cycles28 => 28,
            SampleTime::Cycles56 => 56,
            SampleTime::Cycles84 => 84,
            SampleTime::Cycles112 => 112,
            SampleTime::Cycles144 => 144,
            SampleTime::Cycles480 => 480,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    pub resolution: Resolution,
    /// Converter input channel, the only entry of the regular sequence.
    pub channel: u8,
    /// Long enough for the high impedance source on the input divider.
    pub sample_time: SampleTime,
    /// Converter reference voltage in volts, measured on the board.
    pub reference_voltage: f32,
}

impl AcquisitionConfig {
    /// Input on PB0 (channel 8) at 12 bits against a 3.312 V reference.
    pub const DEFAULT: Self = Self {
        resolution: Resolution::Bits12,
        channel: 8,
        sample_time: SampleTime::Cycles480,
        reference_voltage: 3.312,
    };

    /// Converter clock cycles spent on one sample.
    pub const fn conversion_cycles(&self) -> u32 {
        self.sample_time.cycles() + self.resolution.bits()
    }

    /// Time to fill one buffer of `batch_size` samples, in microseconds.
    pub const fn batch_period_micros(&self, adc_clock_hz: u32, batch_size: usize) -> u64 {
        self.conversion_cycles() as u64 * batch_size as u64 * 1_000_000 / adc_clock_hz as u64
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
