use crate::synth::VoiceBank;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Samples rendered per block by the silent renderer. ~11.6 ms at 44.1 kHz.
const BLOCK_SIZE: usize = 512;

/// Drives the voice bank in real time. Drop it to stop playback.
///
/// With the `audio` feature the bank feeds the default output device. When
/// the device is missing (or the feature is off) the bank is rendered into a
/// discarded buffer at the same pace, so envelopes still run and silence
/// notifications still reach the coordinator.
pub enum AudioOutput {
    #[cfg(feature = "audio")]
    Device(device::DeviceOutput),
    Silent(SilentRenderer),
}

impl AudioOutput {
    pub fn start(bank: Arc<Mutex<VoiceBank>>) -> Self {
        #[cfg(feature = "audio")]
        match device::DeviceOutput::start(bank.clone()) {
            Ok(d) => return AudioOutput::Device(d),
            Err(e) => warn!("{}; falling back to silent rendering", e),
        }
        #[cfg(not(feature = "audio"))]
        warn!("Built without the 'audio' feature, rendering silently");

        AudioOutput::Silent(SilentRenderer::start(bank))
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, AudioOutput::Silent(_))
    }
}

/// Real-time-paced renderer with no output device.
pub struct SilentRenderer {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SilentRenderer {
    pub fn start(bank: Arc<Mutex<VoiceBank>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name("silent-audio".into())
            .spawn(move || {
                let sample_rate = bank.lock().map(|b| b.sample_rate()).unwrap_or(44_100);
                let block_dur = Duration::from_secs_f64(BLOCK_SIZE as f64 / sample_rate as f64);
                let mut buf = vec![0.0f32; BLOCK_SIZE];
                let start = Instant::now();
                info!("Silent renderer running at {} Hz", sample_rate);

                let mut block: u32 = 0;
                while !flag.load(Ordering::Relaxed) {
                    // Pace to real time: wait until this block's expected render time
                    let target = block_dur * block;
                    let elapsed = start.elapsed();
                    if elapsed < target {
                        thread::sleep(target - elapsed);
                    }
                    match bank.lock() {
                        Ok(mut b) => b.render(&mut buf),
                        Err(_) => {
                            warn!("Voice bank poisoned, silent renderer exiting");
                            return;
                        }
                    }
                    block = block.wrapping_add(1);
                }
            });

        match handle {
            Ok(h) => Self { stop, handle: Some(h) },
            Err(e) => {
                warn!("Could not spawn silent renderer: {}", e);
                Self { stop, handle: None }
            }
        }
    }
}

impl Drop for SilentRenderer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[cfg(feature = "audio")]
mod device {
    use crate::error::{FretboardError, Result};
    use crate::synth::VoiceBank;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleFormat, Stream, StreamConfig};
    use log::{error, info};
    use std::sync::{Arc, Mutex};

    /// Holds the cpal `Stream` alive.
    pub struct DeviceOutput {
        _stream: Stream,
    }

    impl DeviceOutput {
        pub fn start(bank: Arc<Mutex<VoiceBank>>) -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| FretboardError::Audio("No default audio output device found".into()))?;

            info!(
                "Audio output: {}",
                device.name().unwrap_or_else(|_| "unknown".into())
            );

            let supported = device
                .default_output_config()
                .map_err(|e| FretboardError::Audio(format!("No supported output config: {e}")))?;
            let format = supported.sample_format();
            let config: StreamConfig = supported.into();
            let channels = config.channels as usize;
            let sample_rate = config.sample_rate.0;

            match bank.lock() {
                Ok(mut b) => b.set_sample_rate(sample_rate),
                Err(_) => return Err(FretboardError::Audio("voice bank lock poisoned".into())),
            }
            info!("Output config: {}Hz  {} ch  {:?}", sample_rate, channels, format);

            let err_fn = |e: cpal::StreamError| error!("Audio stream error: {e}");

            let stream = match format {
                SampleFormat::F32 => {
                    let mut mono = Vec::new();
                    device.build_output_stream(
                        &config,
                        move |data: &mut [f32], _| {
                            render_mono(&bank, &mut mono, data.len() / channels);
                            for (frame, &s) in data.chunks_mut(channels).zip(mono.iter()) {
                                frame.fill(s);
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::I16 => {
                    let mut mono = Vec::new();
                    device.build_output_stream(
                        &config,
                        move |data: &mut [i16], _| {
                            render_mono(&bank, &mut mono, data.len() / channels);
                            for (frame, &s) in data.chunks_mut(channels).zip(mono.iter()) {
                                frame.fill((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::U16 => {
                    let mut mono = Vec::new();
                    device.build_output_stream(
                        &config,
                        move |data: &mut [u16], _| {
                            render_mono(&bank, &mut mono, data.len() / channels);
                            for (frame, &s) in data.chunks_mut(channels).zip(mono.iter()) {
                                frame.fill(((s.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16);
                            }
                        },
                        err_fn,
                        None,
                    )
                }
                fmt => {
                    return Err(FretboardError::Audio(format!(
                        "Unsupported sample format {fmt:?}. Use an F32, I16 or U16 device."
                    )))
                }
            }
            .map_err(|e| FretboardError::Audio(e.to_string()))?;

            stream
                .play()
                .map_err(|e| FretboardError::Audio(e.to_string()))?;

            Ok(Self { _stream: stream })
        }
    }

    /// Fill `mono` with `frames` samples from the bank; silence if the lock is
    /// unavailable.
    fn render_mono(bank: &Arc<Mutex<VoiceBank>>, mono: &mut Vec<f32>, frames: usize) {
        mono.resize(frames, 0.0);
        match bank.lock() {
            Ok(mut b) => b.render(mono),
            Err(_) => mono.fill(0.0),
        }
    }
}
