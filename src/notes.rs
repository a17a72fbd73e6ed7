//! Pitch and duration helpers: MIDI ↔ Hz, note names, duration tokens.

use crate::error::{FretboardError, Result};
use std::fmt;
use std::str::FromStr;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

pub const MIDI_MAX: i32 = 127;

/// Convert MIDI note number to Hz. A4 = MIDI 69 = 440 Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}

/// Scientific pitch name with sharps, `C4` = MIDI 60.
pub fn note_name(midi: u8) -> String {
    let n = midi as i32;
    format!("{}{}", NOTE_NAMES[(n % 12) as usize], n / 12 - 1)
}

/// Reject anything that is not a MIDI pitch.
pub fn validate_pitch(pitch: i32) -> Result<u8> {
    if (0..=MIDI_MAX).contains(&pitch) {
        Ok(pitch as u8)
    } else {
        Err(FretboardError::InvalidPitch(pitch))
    }
}

/// Symbolic note length, tempo-relative except for `Seconds`.
///
/// `3n` is a third of a 4/4 measure, `8t` an eighth triplet, `2m` two
/// measures, `0.25` a quarter second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteDuration {
    Notation(u32),
    Triplet(u32),
    Measures(u32),
    Seconds(f64),
}

impl NoteDuration {
    /// Length in seconds at `bpm` quarter notes per minute.
    pub fn seconds(&self, bpm: f64) -> f64 {
        let measure = 4.0 * 60.0 / bpm;
        match *self {
            NoteDuration::Notation(n) => measure / n as f64,
            NoteDuration::Triplet(n) => measure / n as f64 * 2.0 / 3.0,
            NoteDuration::Measures(n) => measure * n as f64,
            NoteDuration::Seconds(s) => s,
        }
    }
}

impl FromStr for NoteDuration {
    type Err = FretboardError;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        let bad = || FretboardError::InvalidDuration(s.to_string());
        let Some(last) = token.chars().last() else {
            return Err(bad());
        };

        if last.is_ascii_alphabetic() {
            let n: u32 = token[..token.len() - 1].parse().map_err(|_| bad())?;
            if n == 0 {
                return Err(bad());
            }
            return match last {
                'n' => Ok(NoteDuration::Notation(n)),
                't' => Ok(NoteDuration::Triplet(n)),
                'm' => Ok(NoteDuration::Measures(n)),
                _ => Err(bad()),
            };
        }

        let secs: f64 = token.parse().map_err(|_| bad())?;
        if secs.is_finite() && secs > 0.0 {
            Ok(NoteDuration::Seconds(secs))
        } else {
            Err(bad())
        }
    }
}

impl fmt::Display for NoteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteDuration::Notation(n) => write!(f, "{n}n"),
            NoteDuration::Triplet(n) => write!(f, "{n}t"),
            NoteDuration::Measures(n) => write!(f, "{n}m"),
            NoteDuration::Seconds(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_hz() {
        assert!((midi_to_hz(69.0) - 440.0).abs() < 0.01);
        assert!((midi_to_hz(40.0) - 82.41).abs() < 0.01);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(64), "E4");
        assert_eq!(note_name(40), "E2");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }

    #[test]
    fn test_validate_pitch() {
        assert_eq!(validate_pitch(64).unwrap(), 64);
        assert!(matches!(validate_pitch(128), Err(FretboardError::InvalidPitch(128))));
        assert!(matches!(validate_pitch(-1), Err(FretboardError::InvalidPitch(-1))));
    }

    #[test]
    fn test_duration_tokens() {
        let third: NoteDuration = "3n".parse().unwrap();
        assert_eq!(third, NoteDuration::Notation(3));
        assert!((third.seconds(120.0) - 2.0 / 3.0).abs() < 1e-9);

        let eighth_triplet: NoteDuration = "8t".parse().unwrap();
        assert!((eighth_triplet.seconds(120.0) - 0.25 * 2.0 / 3.0).abs() < 1e-9);

        let two_bars: NoteDuration = "2m".parse().unwrap();
        assert!((two_bars.seconds(60.0) - 8.0).abs() < 1e-9);

        let secs: NoteDuration = "0.4".parse().unwrap();
        assert!((secs.seconds(90.0) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_bad_duration_tokens() {
        for bad in ["", "n", "0n", "3q", "-1", "abc", "inf"] {
            assert!(bad.parse::<NoteDuration>().is_err(), "{bad:?} should not parse");
        }
    }
}
