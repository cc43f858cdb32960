#![no_std]

#[cfg(test)]
extern crate std;

pub mod buzzer;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod input;
pub mod morse;
pub mod output;
pub mod protocol;

pub use buzzer::{PiezoBuzzer, Transport};
pub use config::BuzzerConfig;
pub use engine::{Engine, PlaybackState, TickType};
pub use error::Error;
