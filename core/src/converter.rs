use crate::config::AcquisitionConfig;

/// Analog-to-digital converter sampling one input channel continuously.
///
/// Every conversion result is picked up by the transfer engine straight from
/// the data register, so implementations never hand samples to software.
pub trait Converter {
    /// Set resolution, input channel and sampling time, and arm continuous
    /// conversion with transfer requests. Idempotent, call before [`start`].
    ///
    /// [`start`]: Converter::start
    fn configure(&mut self, config: &AcquisitionConfig);

    /// Power up and trigger the first conversion. From here on samples are
    /// produced back to back until [`stop`](Converter::stop).
    fn start(&mut self);

    /// Power down, abandoning the conversion in flight. Idempotent.
    fn stop(&mut self);

    /// Bus address of the data register, the source of every transfer.
    fn data_address(&self) -> u32;
}
