//! Request and notification frames over UART.
//!
//! Incoming bytes are cut into frames by the header's length field. Replies
//! are queued into the TX buffer; notifications additionally wait for the
//! line to drain and give up after the caller's timeout.

use esp_idf_hal::delay::{TickType, NON_BLOCK};
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::uart::{config::Config, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::sys::EspError;
use piezo_core::protocol::{Frame, FrameAssembler};
use piezo_core::Transport;

use super::UartPeripherals;

const BAUD_RATE: u32 = 115_200;

pub struct UartTransport<'d> {
    uart: UartDriver<'d>,
    assembler: FrameAssembler,
}

impl<'d> UartTransport<'d> {
    pub fn new(peripherals: UartPeripherals) -> Result<Self, EspError> {
        let config = Config::new().baudrate(Hertz(BAUD_RATE));
        let uart = UartDriver::new(
            peripherals.uart,
            peripherals.tx,
            peripherals.rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;

        log::info!("UART transport ready at {} baud", BAUD_RATE);

        Ok(Self {
            uart,
            assembler: FrameAssembler::new(),
        })
    }

    /// Reads whatever is buffered and returns the first complete frame.
    /// Never blocks.
    pub fn poll(&mut self) -> Result<Option<Frame>, EspError> {
        let mut byte = [0u8; 1];
        while self.uart.read(&mut byte, NON_BLOCK)? == 1 {
            if let Some(frame) = self.assembler.push(byte[0]) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

impl Transport for UartTransport<'_> {
    type Error = EspError;

    fn reply(&mut self, frame: &[u8]) -> Result<(), EspError> {
        self.uart.write(frame)?;
        Ok(())
    }

    fn send_with_timeout(&mut self, frame: &[u8], timeout_ms: u32) -> Result<(), EspError> {
        self.uart.write(frame)?;
        self.uart
            .wait_tx_done(TickType::new_millis(u64::from(timeout_ms)).ticks())
    }
}
