mod uart_transport;

pub use uart_transport::UartTransport;

use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::UART1;
use esp_idf_svc::sys::EspError;

pub struct SystemPeripherals {
    pub buzzer: BuzzerPeripherals,
    pub uart: UartPeripherals,
}

/// Piezo output and the button that stops playback.
pub struct BuzzerPeripherals {
    pub pin: AnyIOPin,       // GPIO9
    pub btn_boot: AnyInputPin, // GPIO0 (BOOT button)
}

/// Host link. UART0 stays with the console.
pub struct UartPeripherals {
    pub uart: UART1,
    pub tx: AnyOutputPin, // GPIO17
    pub rx: AnyInputPin,  // GPIO18
}

impl SystemPeripherals {
    pub fn take() -> Result<Self, EspError> {
        let peripherals = Peripherals::take()?;

        Ok(SystemPeripherals {
            buzzer: BuzzerPeripherals {
                pin: peripherals.pins.gpio9.into(),
                btn_boot: peripherals.pins.gpio0.into(),
            },
            uart: UartPeripherals {
                uart: peripherals.uart1,
                tx: peripherals.pins.gpio17.into(),
                rx: peripherals.pins.gpio18.into(),
            },
        })
    }
}
