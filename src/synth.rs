//! Per-string monophonic voices.
//!
//! Each string owns one triangle-wave voice with an ADSR envelope. Triggering
//! a voice cuts off whatever it was playing. When a note's release finishes
//! the bank posts `InputEvent::Silence` tagged with that note's generation,
//! so a late notification for a cut-off note can be told apart from the
//! note that replaced it.

use crate::error::{FretboardError, Result};
use crate::interaction::NoteSink;
use crate::notes::{midi_to_hz, validate_pitch, NoteDuration};
use crate::types::{InputEvent, NoteToken, DEFAULT_BPM};
use crossbeam_channel::Sender;
use log::{debug, trace, warn};
use std::sync::{Arc, Mutex};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Per-voice output level; six full voices stay below clipping.
const VOICE_GAIN: f64 = 0.15;

// ─── Envelope ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear ADSR envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Seconds.
    pub attack: f64,
    /// Seconds.
    pub decay: f64,
    /// Level in [0, 1].
    pub sustain: f64,
    /// Seconds.
    pub release: f64,

    stage: Stage,
    level: f64,
    sample_rate: f64,
    stage_samples: usize,
    stage_counter: usize,
    start_level: f64,
}

impl Envelope {
    /// A plucky default: 5 ms attack, 100 ms decay to 0.3, 1 s release.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            attack: 0.005,
            decay: 0.1,
            sustain: 0.3,
            release: 1.0,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            stage_samples: 0,
            stage_counter: 0,
            start_level: 0.0,
        }
    }

    pub fn gate_on(&mut self) {
        self.stage = Stage::Attack;
        self.stage_samples = (self.attack * self.sample_rate) as usize;
        self.stage_counter = 0;
        // retrigger from the current level
        self.start_level = self.level;
    }

    pub fn gate_off(&mut self) {
        if self.stage == Stage::Idle {
            return;
        }
        self.stage = Stage::Release;
        self.stage_samples = (self.release * self.sample_rate) as usize;
        self.stage_counter = 0;
        self.start_level = self.level;
    }

    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                if self.advance() {
                    self.level = 1.0;
                    self.enter(Stage::Decay, self.decay);
                } else {
                    let t = self.progress();
                    self.level = self.start_level + (1.0 - self.start_level) * t;
                }
            }
            Stage::Decay => {
                if self.advance() {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                } else {
                    let t = self.progress();
                    self.level = 1.0 - (1.0 - self.sustain) * t;
                }
            }
            Stage::Sustain => self.level = self.sustain,
            Stage::Release => {
                if self.advance() {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                } else {
                    let t = self.progress();
                    self.level = self.start_level * (1.0 - t);
                }
            }
        }
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// Counts one sample into the stage; true when the stage is over.
    fn advance(&mut self) -> bool {
        if self.stage_counter >= self.stage_samples {
            return true;
        }
        self.stage_counter += 1;
        false
    }

    fn progress(&self) -> f64 {
        self.stage_counter as f64 / self.stage_samples.max(1) as f64
    }

    fn enter(&mut self, stage: Stage, secs: f64) {
        self.stage = stage;
        self.stage_samples = (secs * self.sample_rate) as usize;
        self.stage_counter = 0;
    }
}

// ─── Voice ──────────────────────────────────────────────────────────────────

/// One string's monophonic triangle voice.
#[derive(Debug, Clone)]
pub struct Voice {
    envelope: Envelope,
    phase: f64,
    phase_inc: f64,
    sample_rate: f64,
    /// Samples left before the gate closes; None once released.
    gate_remaining: Option<usize>,
    generation: u64,
    sounding: bool,
}

impl Voice {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            envelope: Envelope::new(sample_rate),
            phase: 0.0,
            phase_inc: 0.0,
            sample_rate,
            gate_remaining: None,
            generation: 0,
            sounding: false,
        }
    }

    pub fn trigger(&mut self, freq_hz: f64, hold_secs: f64, generation: u64) {
        self.phase_inc = freq_hz / self.sample_rate;
        self.gate_remaining = Some((hold_secs.max(0.0) * self.sample_rate) as usize);
        self.generation = generation;
        self.sounding = true;
        self.envelope.gate_on();
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }

    /// Next output sample and, on the sample the release ends, the finished
    /// note's generation.
    pub fn next_sample(&mut self) -> (f64, Option<u64>) {
        if !self.sounding {
            return (0.0, None);
        }

        match self.gate_remaining {
            Some(0) => {
                self.envelope.gate_off();
                self.gate_remaining = None;
            }
            Some(ref mut n) => *n -= 1,
            None => {}
        }

        let level = self.envelope.next_sample();
        let tri = if self.phase < 0.5 {
            4.0 * self.phase - 1.0
        } else {
            3.0 - 4.0 * self.phase
        };
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        if self.gate_remaining.is_none() && self.envelope.is_finished() {
            self.sounding = false;
            return (tri * level, Some(self.generation));
        }
        (tri * level, None)
    }
}

// ─── Voice bank ─────────────────────────────────────────────────────────────

/// One voice per string plus the tempo used to resolve duration tokens.
pub struct VoiceBank {
    voices: Vec<Voice>,
    sample_rate: u32,
    bpm: f64,
    next_generation: u64,
    silence_tx: Option<Sender<InputEvent>>,
}

impl VoiceBank {
    pub fn new(string_count: usize, sample_rate: u32) -> Self {
        Self {
            voices: (0..string_count).map(|_| Voice::new(sample_rate as f64)).collect(),
            sample_rate,
            bpm: DEFAULT_BPM,
            next_generation: 0,
            silence_tx: None,
        }
    }

    /// Post a `Silence` event here whenever a note finishes.
    pub fn with_silence_sender(mut self, tx: Sender<InputEvent>) -> Self {
        self.silence_tx = Some(tx);
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Switch to the output device's rate. Any sounding note is dropped
    /// silently, so call this before playback starts.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        for v in self.voices.iter_mut() {
            *v = Voice::new(sample_rate as f64);
        }
    }

    pub fn is_sounding(&self, string: usize) -> bool {
        self.voices.get(string).is_some_and(|v| v.is_sounding())
    }

    pub fn any_sounding(&self) -> bool {
        self.voices.iter().any(|v| v.is_sounding())
    }

    /// Seconds from note-on until a note of `duration` has fully decayed.
    pub fn note_length_secs(&self, duration: NoteDuration) -> f64 {
        duration.seconds(self.bpm) + Envelope::new(self.sample_rate as f64).release
    }

    /// Start (or restart) `string`'s voice at `pitch` for `duration`.
    pub fn trigger_note(
        &mut self,
        string: usize,
        pitch: i32,
        duration: NoteDuration,
    ) -> Result<NoteToken> {
        let pitch = validate_pitch(pitch)?;
        let hold = duration.seconds(self.bpm);
        let voice = self
            .voices
            .get_mut(string)
            .ok_or(FretboardError::InvalidString(string))?;

        self.next_generation += 1;
        let generation = self.next_generation;
        voice.trigger(midi_to_hz(pitch as f64), hold, generation);
        debug!("String {} note-on {} for {} (gen {})", string, pitch, duration, generation);
        Ok(NoteToken { string, generation })
    }

    /// Mix all voices into `out` (mono), replacing its contents.
    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            let mut mix = 0.0;
            for (string, voice) in self.voices.iter_mut().enumerate() {
                let (s, finished) = voice.next_sample();
                mix += s;
                if let Some(generation) = finished {
                    trace!("String {} silent (gen {})", string, generation);
                    if let Some(tx) = &self.silence_tx {
                        // never block the audio thread
                        if tx.try_send(InputEvent::Silence(NoteToken { string, generation })).is_err() {
                            warn!("Dropped silence notification for string {}", string);
                        }
                    }
                }
            }
            *sample = (mix * VOICE_GAIN) as f32;
        }
    }
}

// ─── Shared handle ──────────────────────────────────────────────────────────

/// Cloneable handle shared by the coordinator (note-on) and the audio
/// output (rendering).
#[derive(Clone)]
pub struct SynthHandle {
    bank: Arc<Mutex<VoiceBank>>,
}

impl SynthHandle {
    pub fn new(bank: VoiceBank) -> Self {
        Self {
            bank: Arc::new(Mutex::new(bank)),
        }
    }

    pub fn bank(&self) -> Arc<Mutex<VoiceBank>> {
        self.bank.clone()
    }
}

impl NoteSink for SynthHandle {
    fn trigger_note(&mut self, string: usize, pitch: i32, duration: NoteDuration) -> Result<NoteToken> {
        let mut bank = self
            .bank
            .lock()
            .map_err(|_| FretboardError::Audio("voice bank lock poisoned".into()))?;
        bank.trigger_note(string, pitch, duration)
    }
}
