use crate::config::{AcquisitionConfig, MAX_BATCH_SIZE};
use crate::handoff::{self, MeasurementSender, Offer, ReadyReceiver};
use crate::{MeasurementEvent, RawSample};

/// Raw sum of one batch of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub sum: u32,
    pub count: u32,
}

impl Reading {
    /// Panics on more than [`MAX_BATCH_SIZE`] samples, the sum would
    /// overflow.
    pub fn of(samples: &[RawSample]) -> Self {
        assert!(
            samples.len() <= MAX_BATCH_SIZE,
            "The sum of a batch has to fit the accumulator"
        );

        Self {
            sum: samples.iter().map(|&sample| u32::from(sample)).sum(),
            count: samples.len() as u32,
        }
    }

    /// Truncated mean, zero for an empty batch.
    pub fn average(&self) -> u32 {
        self.sum.checked_div(self.count).unwrap_or(0)
    }

    /// `sum * reference / (code_range * count)`, so the division by the
    /// number of samples happens in floating point.
    pub fn voltage(&self, code_range: u32, reference_voltage: f32) -> f32 {
        if self.count == 0 {
            return 0.0;
        }

        (self.sum as f32 * reference_voltage) / (code_range as f32 * self.count as f32)
    }
}

/// Reduces every filled buffer into one [`MeasurementEvent`].
pub struct Acquisition {
    code_range: u32,
    reference_voltage: f32,
    sequence: u32,
}

impl Acquisition {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            code_range: config.resolution.code_range(),
            reference_voltage: config.reference_voltage,
            sequence: 0,
        }
    }

    /// Sequence number of the next measurement.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn process(&mut self, samples: &[RawSample]) -> MeasurementEvent {
        let reading = Reading::of(samples);

        let measurement = MeasurementEvent {
            average: reading.average(),
            voltage: reading.voltage(self.code_range, self.reference_voltage),
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        measurement
    }

    /// Handle buffer ready events until the interrupt side goes away.
    pub async fn run(
        &mut self,
        mut ready: ReadyReceiver<'_>,
        mut measurements: MeasurementSender<'_>,
    ) {
        info!("Acquisition task started");

        loop {
            let event = match ready.recv().await {
                Ok(event) => event,
                Err(_) => {
                    warn!("Buffer ready channel closed, stopping acquisition");
                    return;
                }
            };

            let measurement = self.process(&event);
            // Hand the buffer back before anything else
            drop(event);

            trace!(
                "Measurement {}: average {}, {} V",
                measurement.sequence,
                measurement.average,
                measurement.voltage
            );

            match handoff::offer(&mut measurements, measurement) {
                Offer::Delivered => {}
                Offer::Dropped => trace!("Display busy, dropped {}", measurement.sequence),
                Offer::Disconnected => debug!("No display attached"),
            }
        }
    }
}
