//! Mode state machine and per-string state.
//!
//! `Fretboard` is the single owner of everything pointer events mutate. The
//! coordinator feeds it events one at a time; the animation loop only reads
//! it.

use crate::error::{FretboardError, Result};
use crate::notes::{validate_pitch, NoteDuration};
use crate::types::{Mode, NoteToken, StringState};
use log::{debug, info, warn};

/// Where note-ons go. Implemented by the synth handle, and by recorders in
/// tests.
pub trait NoteSink {
    fn trigger_note(&mut self, string: usize, pitch: i32, duration: NoteDuration) -> Result<NoteToken>;
}

pub struct Fretboard {
    strings: Vec<StringState>,
    mode: Mode,
    fret_count: usize,
    duration: NoteDuration,
    /// Whether hovering plays in fret mode as well as in strum mode.
    fret_mode_hover: bool,
}

impl Fretboard {
    pub fn new(tuning: &[u8], fret_count: usize, duration: NoteDuration) -> Self {
        Self {
            strings: tuning.iter().map(|&n| StringState::new(n)).collect(),
            mode: Mode::default(),
            fret_count: fret_count.max(2),
            duration,
            fret_mode_hover: true,
        }
    }

    pub fn with_fret_mode_hover(mut self, enabled: bool) -> Self {
        self.fret_mode_hover = enabled;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn strings(&self) -> &[StringState] {
        &self.strings
    }

    pub fn string(&self, index: usize) -> Option<&StringState> {
        self.strings.get(index)
    }

    /// The end-cap fret: drawn, never playable.
    pub fn dead_fret(&self) -> usize {
        self.fret_count - 1
    }

    pub fn duration(&self) -> NoteDuration {
        self.duration
    }

    /// Switch modes. Entering chord mode from another mode clears every
    /// selection; returns true when that happened.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        let previous = self.mode;
        self.mode = mode;
        if previous == mode {
            return false;
        }
        info!("Mode {} → {}", previous, mode);
        if mode == Mode::Chord {
            for s in self.strings.iter_mut() {
                s.current_note = None;
            }
            return true;
        }
        false
    }

    /// Apply a raw selector value. Unknown values keep the current mode.
    pub fn select_mode(&mut self, raw: &str) -> Result<Mode> {
        let mode: Mode = raw.parse()?;
        self.set_mode(mode);
        Ok(mode)
    }

    /// Pointer entered the fret at `offset` (0 = open string).
    pub fn hover(
        &mut self,
        string: usize,
        offset: usize,
        sink: &mut dyn NoteSink,
    ) -> Result<Option<NoteToken>> {
        self.check_string(string)?;
        if !self.is_target(offset) {
            return Ok(None);
        }
        match self.mode {
            Mode::Strum => self.sound(string, offset, sink).map(Some),
            Mode::Fret if self.fret_mode_hover => self.sound(string, offset, sink).map(Some),
            _ => Ok(None),
        }
    }

    /// Pointer clicked the fret at `offset` (0 = open string).
    pub fn click(
        &mut self,
        string: usize,
        offset: usize,
        sink: &mut dyn NoteSink,
    ) -> Result<Option<NoteToken>> {
        self.check_string(string)?;
        if !self.is_target(offset) {
            return Ok(None);
        }
        match self.mode {
            Mode::Fret => self.sound(string, offset, sink).map(Some),
            Mode::Strum => Ok(None),
            Mode::Chord => {
                self.toggle(string, offset)?;
                Ok(None)
            }
        }
    }

    /// Sound every selected note. Does nothing outside chord mode. A string
    /// that fails to trigger is logged and skipped.
    pub fn play_chord(&mut self, sink: &mut dyn NoteSink) -> Vec<NoteToken> {
        if self.mode != Mode::Chord {
            debug!("Chord trigger ignored in {} mode", self.mode);
            return Vec::new();
        }
        let duration = self.duration;
        let mut tokens = Vec::new();
        for (i, s) in self.strings.iter_mut().enumerate() {
            let Some(note) = s.current_note else {
                continue;
            };
            match sink.trigger_note(i, note as i32, duration) {
                Ok(token) => {
                    s.playing = true;
                    s.active_generation = Some(token.generation);
                    tokens.push(token);
                }
                Err(e) => warn!("Chord: string {} skipped: {}", i, e),
            }
        }
        tokens
    }

    /// Replace the chord selection wholesale, one entry per string.
    pub fn select_chord(&mut self, notes: &[Option<u8>]) -> Result<()> {
        if notes.len() != self.strings.len() {
            return Err(FretboardError::InvalidChord(format!(
                "{} notes for {} strings",
                notes.len(),
                self.strings.len()
            )));
        }
        for (s, &n) in self.strings.iter_mut().zip(notes) {
            s.current_note = n;
        }
        Ok(())
    }

    /// A voice went quiet. Clears `playing` only if the finished note is the
    /// one the string is currently showing.
    pub fn on_silence(&mut self, token: NoteToken) -> bool {
        let Some(s) = self.strings.get_mut(token.string) else {
            return false;
        };
        if s.active_generation != Some(token.generation) {
            debug!(
                "Stale silence on string {} (gen {}, active {:?})",
                token.string, token.generation, s.active_generation
            );
            return false;
        }
        s.playing = false;
        s.active_generation = None;
        true
    }

    /// Whether the fret at `offset` should wiggle: the string is sounding and
    /// the fret lies above the sounding note.
    pub fn is_playing(&self, string: usize, offset: usize) -> bool {
        let Some(s) = self.strings.get(string) else {
            return false;
        };
        if !s.playing {
            return false;
        }
        !matches!(s.current_note, Some(c) if s.pitch_at(offset) <= c as i32)
    }

    fn check_string(&self, string: usize) -> Result<()> {
        if string < self.strings.len() {
            Ok(())
        } else {
            Err(FretboardError::InvalidString(string))
        }
    }

    fn is_target(&self, offset: usize) -> bool {
        offset < self.dead_fret()
    }

    fn sound(&mut self, string: usize, offset: usize, sink: &mut dyn NoteSink) -> Result<NoteToken> {
        let pitch = validate_pitch(self.strings[string].pitch_at(offset))?;
        let token = sink.trigger_note(string, pitch as i32, self.duration)?;
        let s = &mut self.strings[string];
        s.playing = true;
        s.current_note = Some(pitch);
        s.active_generation = Some(token.generation);
        Ok(token)
    }

    fn toggle(&mut self, string: usize, offset: usize) -> Result<()> {
        let pitch = validate_pitch(self.strings[string].pitch_at(offset))?;
        let s = &mut self.strings[string];
        s.current_note = if s.current_note == Some(pitch) {
            None
        } else {
            Some(pitch)
        };
        Ok(())
    }
}

/// Note sink that records every trigger instead of making sound.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub notes: Vec<(usize, i32)>,
    next_generation: u64,
}

impl NoteSink for RecordingSink {
    fn trigger_note(&mut self, string: usize, pitch: i32, _duration: NoteDuration) -> Result<NoteToken> {
        validate_pitch(pitch)?;
        self.next_generation += 1;
        self.notes.push((string, pitch));
        Ok(NoteToken {
            string,
            generation: self.next_generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TUNING;

    fn board() -> Fretboard {
        Fretboard::new(&DEFAULT_TUNING, 22, NoteDuration::Notation(3))
    }

    #[test]
    fn test_fret_click_plays_every_target() {
        for s in 0..6 {
            for f in 1..=20 {
                let mut fb = board();
                let mut sink = RecordingSink::default();
                let token = fb.click(s, f, &mut sink).unwrap().unwrap();
                let expected = DEFAULT_TUNING[s] as i32 + f as i32;
                assert_eq!(sink.notes, vec![(s, expected)]);
                assert_eq!(fb.string(s).unwrap().current_note, Some(expected as u8));
                assert!(fb.string(s).unwrap().playing);
                assert_eq!(fb.string(s).unwrap().active_generation, Some(token.generation));
            }
        }
    }

    #[test]
    fn test_open_string_click() {
        let mut fb = board();
        let mut sink = RecordingSink::default();
        fb.click(5, 0, &mut sink).unwrap();
        assert_eq!(sink.notes, vec![(5, 40)]);
        assert_eq!(fb.string(5).unwrap().current_note, Some(40));
    }

    #[test]
    fn test_hover_by_mode() {
        let mut fb = board();
        let mut sink = RecordingSink::default();
        fb.hover(0, 3, &mut sink).unwrap();
        assert_eq!(sink.notes, vec![(0, 67)]);

        fb.set_mode(Mode::Strum);
        fb.hover(1, 2, &mut sink).unwrap();
        assert_eq!(sink.notes.last(), Some(&(1, 61)));

        fb.set_mode(Mode::Chord);
        let before = sink.notes.len();
        assert!(fb.hover(2, 4, &mut sink).unwrap().is_none());
        assert_eq!(sink.notes.len(), before);
        assert_eq!(fb.string(2).unwrap().current_note, None);
    }

    #[test]
    fn test_fret_hover_can_be_disabled() {
        let mut fb = board().with_fret_mode_hover(false);
        let mut sink = RecordingSink::default();
        assert!(fb.hover(0, 3, &mut sink).unwrap().is_none());
        assert!(sink.notes.is_empty());
        fb.click(0, 3, &mut sink).unwrap();
        assert_eq!(sink.notes.len(), 1);
    }

    #[test]
    fn test_strum_click_does_nothing() {
        let mut fb = board();
        fb.set_mode(Mode::Strum);
        let mut sink = RecordingSink::default();
        assert!(fb.click(3, 5, &mut sink).unwrap().is_none());
        assert!(sink.notes.is_empty());
        assert!(!fb.string(3).unwrap().playing);
    }

    #[test]
    fn test_chord_click_toggles_without_sound() {
        let mut fb = board();
        fb.set_mode(Mode::Chord);
        let mut sink = RecordingSink::default();
        fb.click(1, 5, &mut sink).unwrap();
        assert_eq!(fb.string(1).unwrap().current_note, Some(64));
        fb.click(1, 5, &mut sink).unwrap();
        assert_eq!(fb.string(1).unwrap().current_note, None);
        fb.click(1, 0, &mut sink).unwrap();
        fb.click(1, 2, &mut sink).unwrap();
        assert_eq!(fb.string(1).unwrap().current_note, Some(61));
        assert!(sink.notes.is_empty());
        assert!(!fb.string(1).unwrap().playing);
    }

    #[test]
    fn test_dead_fret_is_inert() {
        for mode in Mode::ALL {
            let mut fb = board();
            fb.set_mode(mode);
            let mut sink = RecordingSink::default();
            let before: Vec<StringState> = fb.strings().to_vec();
            assert!(fb.hover(0, 21, &mut sink).unwrap().is_none());
            assert!(fb.click(0, 21, &mut sink).unwrap().is_none());
            assert!(fb.click(0, 40, &mut sink).unwrap().is_none());
            assert!(sink.notes.is_empty());
            assert_eq!(fb.strings(), &before[..]);
        }
    }

    #[test]
    fn test_bad_string_index() {
        let mut fb = board();
        let mut sink = RecordingSink::default();
        assert!(matches!(fb.click(6, 1, &mut sink), Err(FretboardError::InvalidString(6))));
    }

    #[test]
    fn test_chord_entry_clears_once() {
        let mut fb = board();
        let mut sink = RecordingSink::default();
        fb.click(0, 3, &mut sink).unwrap();
        fb.click(4, 2, &mut sink).unwrap();
        assert!(fb.set_mode(Mode::Chord));
        assert!(fb.strings().iter().all(|s| s.current_note.is_none()));

        fb.click(2, 2, &mut sink).unwrap();
        assert!(!fb.set_mode(Mode::Chord));
        assert_eq!(fb.string(2).unwrap().current_note, Some(57));

        assert!(!fb.set_mode(Mode::Strum));
        assert_eq!(fb.string(2).unwrap().current_note, Some(57));
        assert!(fb.set_mode(Mode::Chord));
        assert_eq!(fb.string(2).unwrap().current_note, None);
    }

    #[test]
    fn test_unknown_mode_keeps_last() {
        let mut fb = board();
        fb.select_mode("strum").unwrap();
        assert!(fb.select_mode("tapping").is_err());
        assert_eq!(fb.mode(), Mode::Strum);
    }

    #[test]
    fn test_play_chord_fires_selected_only() {
        let mut fb = board();
        fb.set_mode(Mode::Chord);
        fb.select_chord(&[None, Some(52), None, Some(47), None, None]).unwrap();
        let mut sink = RecordingSink::default();
        let tokens = fb.play_chord(&mut sink);
        assert_eq!(sink.notes, vec![(1, 52), (3, 47)]);
        assert_eq!(tokens.len(), 2);
        assert!(fb.string(1).unwrap().playing);
        assert!(fb.string(3).unwrap().playing);
        assert!(!fb.string(0).unwrap().playing);
        assert_eq!(fb.string(0).unwrap().current_note, None);
    }

    #[test]
    fn test_play_chord_outside_chord_mode() {
        let mut fb = board();
        fb.select_chord(&[Some(64), None, None, None, None, None]).unwrap();
        let mut sink = RecordingSink::default();
        assert!(fb.play_chord(&mut sink).is_empty());
        assert!(sink.notes.is_empty());
    }

    #[test]
    fn test_stale_silence_is_ignored() {
        let mut fb = board();
        let mut sink = RecordingSink::default();
        let first = fb.click(0, 1, &mut sink).unwrap().unwrap();
        let second = fb.click(0, 2, &mut sink).unwrap().unwrap();

        assert!(!fb.on_silence(first));
        assert!(fb.string(0).unwrap().playing);
        assert!(fb.on_silence(second));
        assert!(!fb.string(0).unwrap().playing);
        assert_eq!(fb.string(0).unwrap().current_note, Some(66));
    }

    #[test]
    fn test_is_playing() {
        let mut fb = board();
        for f in 0..22 {
            assert!(!fb.is_playing(0, f));
        }
        let mut sink = RecordingSink::default();
        fb.click(0, 5, &mut sink).unwrap();
        assert!(!fb.is_playing(0, 3));
        assert!(!fb.is_playing(0, 5));
        assert!(fb.is_playing(0, 6));
        assert!(fb.is_playing(0, 21));
        assert!(!fb.is_playing(1, 6));
        assert!(!fb.is_playing(9, 6));

        // playing with nothing selected: every fret moves
        fb.set_mode(Mode::Chord);
        assert!(fb.is_playing(0, 1));
    }
}
