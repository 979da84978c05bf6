#![no_main]
#![no_std]

use core::convert::Infallible;

use defmt::{unwrap, Debug2Format};
use defmt_rtt as _;
use panic_probe as _;
use rtic::app;
use rtic_monotonics::systick::{ExtU64, Systick};
use rtic_monotonics::Monotonic;
use rtic_sync::make_channel;
use static_cell::StaticCell;
use stm32f7xx_hal::{
    gpio::{Output, Pin},
    prelude::*,
};

use voltmeter_core::{
    display::{DisplayError, DisplayTask},
    handoff::{MeasurementReceiver, MeasurementSender, ReadyReceiver, ReadySender},
    Acquisition, AcquisitionConfig, BufferReadyEvent, DoubleBuffer, Frontend, MeasurementEvent,
    Offer, SampleBuffer, TransferEngine, BATCH_SIZE, HANDOFF_CAPACITY,
};
use voltmeter_firmware::{adc::Adc1, console::DefmtConsole, dma::Dma2Stream0};

defmt::timestamp!("{=u64:ms}", Systick::now().ticks());

const CONFIG: AcquisitionConfig = AcquisitionConfig::DEFAULT;

const WELCOME_TIME_MS: u64 = 2_000;
const DISPLAY_PERIOD_MS: u64 = 250;

#[app(device = stm32f7xx_hal::pac, dispatchers = [CAN1_RX0])]
mod app {
    use super::*;

    static BUFFER_A: StaticCell<SampleBuffer<BATCH_SIZE>> = StaticCell::new();
    static BUFFER_B: StaticCell<SampleBuffer<BATCH_SIZE>> = StaticCell::new();

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        frontend: Frontend<Adc1, Dma2Stream0>,
        ready_tx: ReadySender<'static>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        defmt::info!("Voltmeter starting");

        let mut rcc = p.RCC.constrain();
        // Setup clocks
        let clocks = {
            let clocks = rcc.cfgr.sysclk(216.MHz()).hclk(216.MHz());
            clocks.freeze()
        };
        defmt::debug!("Clocks: {:?}", Debug2Format(&clocks));

        // Setup systick to be used for delays
        let systick_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.sysclk().to_Hz(), systick_token);

        // Setup GPIO
        let led_pin = {
            let gpiob = p.GPIOB.split();

            // ADC1 channel 8
            let _adc1_in = gpiob.pb0.into_analog();

            gpiob.pb7.into_push_pull_output()
        };

        let buffers = DoubleBuffer::new(
            BUFFER_A.init_with(|| [0; BATCH_SIZE]),
            BUFFER_B.init_with(|| [0; BATCH_SIZE]),
        );
        let converter = Adc1::new(p.ADC1, p.ADC_COMMON, &mut rcc.apb2);
        let stream = Dma2Stream0::new(p.DMA2, &mut rcc.ahb1);

        let mut frontend = Frontend::new(converter, TransferEngine::new(stream, buffers));
        unwrap!(frontend.configure(&CONFIG));

        let adc_clock = Adc1::clock_hz(clocks.pclk2().to_Hz());
        defmt::info!(
            "ADC clock {} Hz, one measurement every {} us",
            adc_clock,
            CONFIG.batch_period_micros(adc_clock, BATCH_SIZE)
        );

        let (ready_tx, ready_rx) = make_channel!(BufferReadyEvent, HANDOFF_CAPACITY);
        let (measurement_tx, measurement_rx) = make_channel!(MeasurementEvent, HANDOFF_CAPACITY);

        // Start tasks
        {
            acquire::spawn(ready_rx, measurement_tx)
                .unwrap_or_else(|_| defmt::panic!("Failed to start acquire"));
            refresh_display::spawn(measurement_rx)
                .unwrap_or_else(|_| defmt::panic!("Failed to start refresh_display"));
            heartbeat::spawn(led_pin).unwrap_or_else(|_| defmt::panic!("Failed to start heartbeat"));
        }

        // The first transfer complete interrupt is held off until init returns
        frontend.start();

        (Shared {}, Local { frontend, ready_tx })
    }

    #[task(binds = DMA2_STREAM0, local = [frontend, ready_tx], priority = 2)]
    fn dma2_stream0(cx: dma2_stream0::Context) {
        match cx.local.frontend.on_transfer_complete(cx.local.ready_tx) {
            Some(Offer::Delivered) => {}
            Some(Offer::Dropped) => defmt::trace!("Acquisition busy, batch dropped"),
            Some(Offer::Disconnected) => {
                defmt::error!("Acquisition is gone, stopping the converter");
                unwrap!(cx.local.frontend.stop());
            }
            None => defmt::warn!("DMA2 stream 0 interrupt without a finished transfer"),
        }
    }

    #[task(priority = 1)]
    async fn acquire(
        _cx: acquire::Context,
        ready_rx: ReadyReceiver<'static>,
        measurement_tx: MeasurementSender<'static>,
    ) {
        let mut acquisition = Acquisition::new(&CONFIG);
        acquisition.run(ready_rx, measurement_tx).await;
    }

    #[task(priority = 0)]
    async fn refresh_display(
        _cx: refresh_display::Context,
        mut measurement_rx: MeasurementReceiver<'static>,
    ) {
        let mut display = DisplayTask::new(DefmtConsole);

        report(display.welcome());
        Systick::delay(WELCOME_TIME_MS.millis()).await;

        loop {
            Systick::delay(DISPLAY_PERIOD_MS.millis()).await;

            match measurement_rx.recv().await {
                Ok(measurement) => report(display.show(&measurement)),
                Err(_) => {
                    defmt::error!("Measurement channel closed");
                    return;
                }
            }
        }
    }

    /// Blink LD2 so a hung scheduler is visible on the board
    #[task(priority = 0)]
    async fn heartbeat(_cx: heartbeat::Context, mut led: Pin<'B', 7, Output>) {
        loop {
            led.set_low();
            Systick::delay(1_000u64.millis()).await;
            led.set_high();
            Systick::delay(100u64.millis()).await;
            led.set_low();
            Systick::delay(100u64.millis()).await;
            led.set_high();
            Systick::delay(100u64.millis()).await;
        }
    }
}

fn report(result: Result<(), DisplayError<Infallible>>) {
    match result {
        Ok(()) => {}
        Err(DisplayError::Format) => defmt::warn!("Measurement does not fit the display"),
        Err(DisplayError::Device(never)) => match never {},
    }
}
