use core::convert::Infallible;

use voltmeter_core::display::{CharacterDisplay, Row};

/// Stands in for the character LCD by printing each line over RTT.
pub struct DefmtConsole;

impl CharacterDisplay for DefmtConsole {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write_line(&mut self, row: Row, text: &str) -> Result<(), Self::Error> {
        defmt::println!("{} |{=str}|", row, text);
        Ok(())
    }
}
