use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_svc::sys::EspError;
use piezo_core::consts::CALCULATION_TICK_HZ;
use piezo_core::{BuzzerConfig, PiezoBuzzer, TickType};

mod peripherals;

use peripherals::{SystemPeripherals, UartTransport};

/// Device uid carried in every frame.
const UID: u32 = 0x0050_425a;

fn main() -> Result<(), EspError> {
    // It is necessary to call this function once. Otherwise, some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("Piezo buzzer starting...");

    let peripherals = SystemPeripherals::take()?;
    let pin = PinDriver::output(peripherals.buzzer.pin)?;
    let boot = PinDriver::input(peripherals.buzzer.btn_boot)?;
    let mut transport = UartTransport::new(peripherals.uart)?;

    let mut buzzer = match PiezoBuzzer::new(UID, pin, Ets, BuzzerConfig::default()) {
        Ok(buzzer) => buzzer,
        Err(e) => {
            log::error!("buzzer setup failed: {}", e);
            return Ok(());
        }
    };

    // Convert the tick period to FreeRTOS ticks, at least one.
    let ticks_to_wait = (esp_idf_svc::sys::configTICK_RATE_HZ / CALCULATION_TICK_HZ).max(1);
    let mut last_wake_time = unsafe { esp_idf_svc::sys::xTaskGetTickCount() };

    log::info!("Tick loop running at {} Hz, hold BOOT to stop", CALCULATION_TICK_HZ);
    // BOOT is pulled high, pressing it pulls it low
    while boot.is_high() {
        loop {
            match transport.poll() {
                Ok(Some(frame)) => {
                    if let Err(e) = buzzer.invocation(&frame, &mut transport) {
                        log::warn!("reply failed: {:?}", e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("UART read failed: {:?}", e);
                    break;
                }
            }
        }

        buzzer.tick(TickType::MESSAGE | TickType::CALCULATION, &mut transport);

        unsafe {
            esp_idf_svc::sys::xTaskDelayUntil(&mut last_wake_time as *mut _, ticks_to_wait);
        }
    }

    // Hand the pin back as a pulled-up input.
    let (pin, _delay) = buzzer.release();
    let mut pin = pin.into_input()?;
    pin.set_pull(Pull::Up)?;
    log::info!("Buzzer stopped, pin released");

    loop {
        FreeRtos::delay_ms(1000);
    }
}
