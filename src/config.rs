//! Session configuration: canvas, tuning, palette, note length.
//!
//! Loaded from an optional JSON file, then overridden by command-line flags.

use crate::error::{FretboardError, Result};
use crate::geometry::Geometry;
use crate::notes::{NoteDuration, MIDI_MAX};
use crate::types::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FretboardConfig {
    pub width: f64,
    pub height: f64,
    pub fret_count: usize,
    /// Open-string MIDI pitches, high string first. Its length is the string count.
    pub tuning: Vec<u8>,
    pub palette: Vec<String>,
    /// Duration token for every note, e.g. `3n`.
    pub note_duration: String,
    pub bpm: f64,
    /// Play on hover in fret mode too, not only in strum mode.
    pub fret_mode_hover: bool,
    pub initial_mode: Mode,
}

impl Default for FretboardConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fret_count: DEFAULT_FRET_COUNT,
            tuning: DEFAULT_TUNING.to_vec(),
            palette: PALETTE.iter().map(|c| c.to_string()).collect(),
            note_duration: DEFAULT_NOTE_DURATION.to_string(),
            bpm: DEFAULT_BPM,
            fret_mode_hover: true,
            initial_mode: Mode::Fret,
        }
    }
}

impl FretboardConfig {
    /// Load from a JSON file. Returns None if file is absent or malformed.
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(c) => {
                info!("Loaded config from {:?}", path);
                Some(c)
            }
            Err(e) => {
                warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn string_count(&self) -> usize {
        self.tuning.len()
    }

    /// Resize the canvas keeping its aspect ratio.
    pub fn scale(&mut self, factor: f64) {
        self.width *= factor;
        self.height *= factor;
    }

    pub fn duration(&self) -> Result<NoteDuration> {
        self.note_duration.parse()
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::compute(self.width, self.height, self.fret_count, self.string_count())
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(FretboardError::Config(msg));
        if !(self.width > 0.0 && self.height > 0.0) || !self.width.is_finite() || !self.height.is_finite() {
            return bad(format!("canvas {}x{} must be positive", self.width, self.height));
        }
        if self.fret_count < 2 {
            return bad(format!("fret_count {} must be at least 2", self.fret_count));
        }
        if self.tuning.len() < 2 {
            return bad(format!("tuning needs at least 2 strings, got {}", self.tuning.len()));
        }
        if self.palette.is_empty() {
            return bad("palette is empty".into());
        }
        if !(self.bpm > 0.0 && self.bpm.is_finite()) {
            return bad(format!("bpm {} must be positive", self.bpm));
        }
        // highest playable fret on every string must still be a MIDI pitch
        let top = self.fret_count as i32 - 2;
        if let Some(&base) = self.tuning.iter().find(|&&b| b as i32 + top > MIDI_MAX) {
            return Err(FretboardError::InvalidPitch(base as i32 + top));
        }
        self.duration()?;
        Ok(())
    }
}
