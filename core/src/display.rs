//! Plain text rendering of measurements on a two line character display.

use core::fmt::Write;

use heapless::String;

use crate::MeasurementEvent;

pub const LINE_WIDTH: usize = 16;

pub type Line = String<LINE_WIDTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Row {
    Top,
    Bottom,
}

/// Whatever can show two lines of text.
pub trait CharacterDisplay {
    type Error;

    fn clear(&mut self) -> Result<(), Self::Error>;

    fn write_line(&mut self, row: Row, text: &str) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError<E> {
    /// The text did not fit on the line.
    Format,
    Device(E),
}

impl<E> From<core::fmt::Error> for DisplayError<E> {
    fn from(_: core::fmt::Error) -> Self {
        DisplayError::Format
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub top: Line,
    pub bottom: Line,
}

impl Screen {
    /// Voltage on top, `sequence:average` below.
    ///
    /// Only the last six digits of the sequence number fit the line.
    pub fn render(measurement: &MeasurementEvent) -> Result<Self, core::fmt::Error> {
        let mut top = Line::new();
        write!(top, "    {:4.4} V    ", measurement.voltage)?;

        let mut bottom = Line::new();
        write!(
            bottom,
            "{:6}:{:8}",
            measurement.sequence % 1_000_000,
            measurement.average
        )?;

        Ok(Self { top, bottom })
    }
}

pub struct DisplayTask<D> {
    display: D,
}

impl<D: CharacterDisplay> DisplayTask<D> {
    pub const WELCOME: [&'static str; 2] = ["    Welcome!    ", "ADC meas on PB0"];

    pub fn new(display: D) -> Self {
        Self { display }
    }

    pub fn welcome(&mut self) -> Result<(), DisplayError<D::Error>> {
        let [top, bottom] = Self::WELCOME;
        self.write(top, bottom)
    }

    /// Replace whatever is shown by `measurement`. A measurement that does
    /// not render leaves the previous one on screen.
    pub fn show(&mut self, measurement: &MeasurementEvent) -> Result<(), DisplayError<D::Error>> {
        let screen = Screen::render(measurement)?;
        self.write(&screen.top, &screen.bottom)
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn write(&mut self, top: &str, bottom: &str) -> Result<(), DisplayError<D::Error>> {
        self.display.clear().map_err(DisplayError::Device)?;
        self.display
            .write_line(Row::Top, top)
            .map_err(DisplayError::Device)?;
        self.display
            .write_line(Row::Bottom, bottom)
            .map_err(DisplayError::Device)?;
        Ok(())
    }
}
