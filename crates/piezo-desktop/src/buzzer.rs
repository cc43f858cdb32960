//! Makes the simulated pin audible.
//!
//! On hardware one pulse per calculation tick sounds like a tone at the tick
//! rate. Here a square wave at that rate is played while pulses arrive.

#[cfg(feature = "audio")]
mod imp {
    use std::time::Duration;

    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

    // Square wave generator
    struct SquareWave {
        frequency: f32,
        sample_rate: u32,
        current_sample: usize,
    }

    impl SquareWave {
        fn new(frequency: f32, sample_rate: u32) -> Self {
            Self {
                frequency,
                sample_rate,
                current_sample: 0,
            }
        }
    }

    impl Iterator for SquareWave {
        type Item = f32;

        fn next(&mut self) -> Option<Self::Item> {
            let sample_position = self.current_sample as f32 / self.sample_rate as f32;
            let cycle_position = (sample_position * self.frequency) % 1.0;
            self.current_sample = self.current_sample.wrapping_add(1);

            // Narrow duty cycle, closer to a piezo fed with short pulses.
            if cycle_position < 0.1 { Some(0.15) } else { Some(-0.02) }
        }
    }

    impl Source for SquareWave {
        fn current_frame_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> u16 {
            1
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }

    pub struct Speaker {
        // Dropping the stream silences the sink.
        _stream: Option<(OutputStream, OutputStreamHandle)>,
        sink: Option<Sink>,
        active: bool,
    }

    impl Speaker {
        pub fn new(tone_hz: u32) -> Self {
            let Ok((stream, handle)) = OutputStream::try_default() else {
                log::warn!("no audio output available, running silent");
                return Self::silent();
            };
            let sink = match Sink::try_new(&handle) {
                Ok(sink) => sink,
                Err(e) => {
                    log::warn!("failed to open audio sink: {}", e);
                    return Self::silent();
                }
            };
            sink.pause();
            sink.append(SquareWave::new(tone_hz as f32, 48_000));
            log::info!("audio output ready ({} Hz tone)", tone_hz);

            Self {
                _stream: Some((stream, handle)),
                sink: Some(sink),
                active: false,
            }
        }

        fn silent() -> Self {
            Self {
                _stream: None,
                sink: None,
                active: false,
            }
        }

        pub fn set_active(&mut self, active: bool) {
            if active == self.active {
                return;
            }
            self.active = active;
            if let Some(sink) = &self.sink {
                if active { sink.play() } else { sink.pause() }
            }
        }

        pub fn is_active(&self) -> bool {
            self.active
        }
    }
}

#[cfg(not(feature = "audio"))]
mod imp {
    pub struct Speaker {
        active: bool,
    }

    impl Speaker {
        pub fn new(_tone_hz: u32) -> Self {
            log::debug!("built without the audio feature, running silent");
            Self { active: false }
        }

        pub fn set_active(&mut self, active: bool) {
            self.active = active;
        }

        pub fn is_active(&self) -> bool {
            self.active
        }
    }
}

pub use imp::Speaker;
