use crate::error::{FretboardError, Result};
use crate::notes::NoteDuration;
use crate::synth::{VoiceBank, DEFAULT_SAMPLE_RATE};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;
use std::path::Path;

/// Samples rendered per pass.
const CHUNK_SIZE: usize = 1024;

/// Render a strummed-at-once chord offline and write it as 16-bit mono WAV.
///
/// `notes` has one entry per string, high string first; None strings stay
/// silent. Rendering runs until every voice has finished its release.
/// Returns the number of samples written.
pub fn export_chord(
    path: &Path,
    notes: &[Option<u8>],
    duration: NoteDuration,
    bpm: f64,
) -> Result<usize> {
    let mut bank = VoiceBank::new(notes.len(), DEFAULT_SAMPLE_RATE).with_bpm(bpm);
    for (string, note) in notes.iter().enumerate() {
        if let Some(n) = note {
            bank.trigger_note(string, *n as i32, duration)?;
        }
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: DEFAULT_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| FretboardError::Audio(format!("WAV write failed: {e}"));
    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;

    // Upper bound in case an envelope never settles.
    let max_samples =
        ((bank.note_length_secs(duration) + 1.0) * DEFAULT_SAMPLE_RATE as f64) as usize;
    let mut buf = vec![0.0f32; CHUNK_SIZE];
    let mut written = 0;
    while bank.any_sounding() && written < max_samples {
        bank.render(&mut buf);
        for &s in &buf {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .map_err(wav_err)?;
        }
        written += buf.len();
    }
    writer.finalize().map_err(wav_err)?;

    info!(
        "Wrote {:?}: {} samples ({:.2}s)",
        path,
        written,
        written as f64 / DEFAULT_SAMPLE_RATE as f64
    );
    Ok(written)
}
