#![no_std]

pub mod adc;
pub mod console;
pub mod dma;
