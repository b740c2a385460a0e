//! Fallback tone output using cpal

use std::f32::consts::TAU;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SizedSample, Stream, StreamConfig};
use tracing::{debug, warn};

use crate::sound::CancelToken;
use crate::AlarmError;

/// Peak level of the generated tone
const AMPLITUDE: f32 = 0.5;

/// Phase-continuous sine oscillator
#[derive(Debug, Clone)]
pub struct SineWave {
    step: f32,
    phase: f32,
}

impl SineWave {
    pub fn new(frequency_hz: u32, sample_rate: u32) -> Self {
        Self {
            step: frequency_hz as f32 / sample_rate.max(1) as f32,
            phase: 0.0,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let value = (self.phase * TAU).sin() * AMPLITUDE;
        self.phase = (self.phase + self.step).fract();
        value
    }
}

/// Play a sine tone on the default output device.
///
/// Blocks for `duration` or until `token` is cancelled. The stream lives on
/// the calling thread because `cpal::Stream` is not `Send`.
pub fn play_tone(frequency_hz: u32, duration: Duration, token: &CancelToken) -> Result<(), AlarmError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AlarmError::Playback("No default output device".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| AlarmError::Playback(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    debug!(
        "Tone {} Hz on {} ({} Hz, {} channels)",
        frequency_hz,
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        config.sample_rate.0,
        config.channels
    );

    let wave = SineWave::new(frequency_hz, config.sample_rate.0);
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_tone_stream::<f32>(&device, &config, wave),
        cpal::SampleFormat::I16 => build_tone_stream::<i16>(&device, &config, wave),
        cpal::SampleFormat::U16 => build_tone_stream::<u16>(&device, &config, wave),
        cpal::SampleFormat::I32 => build_tone_stream::<i32>(&device, &config, wave),
        cpal::SampleFormat::U8 => build_tone_stream::<u8>(&device, &config, wave),
        other => Err(AlarmError::Playback(format!("Unsupported sample format: {:?}", other))),
    }?;

    stream.play().map_err(|e| AlarmError::Playback(e.to_string()))?;
    token.sleep(duration);
    drop(stream);
    Ok(())
}

fn build_tone_stream<T>(device: &Device, config: &StreamConfig, mut wave: SineWave) -> Result<Stream, AlarmError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let err_fn = |err| warn!("Tone stream error: {}", err);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = T::from_sample(wave.next_sample());
                    frame.fill(value);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AlarmError::Playback(e.to_string()))
}
