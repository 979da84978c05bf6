use crate::config::AcquisitionConfig;
use crate::converter::Converter;
use crate::handoff::{Offer, ReadySender};
use crate::transfer::{TransferEngine, TransferStream};
use crate::Fault;

/// Converter and transfer engine, brought up and torn down in the right
/// order.
pub struct Frontend<C, S> {
    converter: C,
    engine: TransferEngine<S>,
}

impl<C, S> Frontend<C, S>
where
    C: Converter,
    S: TransferStream,
{
    pub fn new(converter: C, engine: TransferEngine<S>) -> Self {
        Self { converter, engine }
    }

    pub fn configure(&mut self, config: &AcquisitionConfig) -> Result<(), Fault> {
        self.engine.configure(self.converter.data_address())?;
        self.converter.configure(config);

        debug!(
            "Converter configured: channel {}, {} bits",
            config.channel,
            config.resolution.bits()
        );
        Ok(())
    }

    /// The engine has to be listening before the first conversion finishes.
    pub fn start(&mut self) {
        self.engine.enable();
        self.converter.start();
        info!("Sampling started");
    }

    /// Safe to call repeatedly and from the completion interrupt.
    pub fn stop(&mut self) -> Result<(), Fault> {
        self.converter.stop();
        self.engine.disable()
    }

    pub fn on_transfer_complete(&mut self, ready: &mut ReadySender<'_>) -> Option<Offer> {
        self.engine.on_complete(ready)
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut C, &mut TransferEngine<S>) {
        (&mut self.converter, &mut self.engine)
    }
}
