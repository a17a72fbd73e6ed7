use crate::error::FretboardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Interaction mode ───────────────────────────────────────────────────────

/// What pointer events on a fret do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single-fret play.
    #[default]
    Fret,
    /// Mouse-over strumming.
    Strum,
    /// Chord building: clicks select notes, the chord trigger plays them.
    Chord,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Fret, Mode::Strum, Mode::Chord];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fret => "fret",
            Mode::Strum => "strum",
            Mode::Chord => "chord",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = FretboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fret" => Ok(Mode::Fret),
            "strum" => Ok(Mode::Strum),
            "chord" => Ok(Mode::Chord),
            other => Err(FretboardError::InvalidMode(other.to_string())),
        }
    }
}

// ─── Per-string state ───────────────────────────────────────────────────────

/// Transient state of one physical string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringState {
    /// Open-string pitch (MIDI).
    pub base_note: u8,
    /// True from note-on until the voice reports silence.
    pub playing: bool,
    /// Selected or sounding pitch; None when nothing is selected.
    pub current_note: Option<u8>,
    /// Generation of the note currently owning `playing`.
    #[serde(skip)]
    pub active_generation: Option<u64>,
}

impl StringState {
    pub fn new(base_note: u8) -> Self {
        Self {
            base_note,
            playing: false,
            current_note: None,
            active_generation: None,
        }
    }

    /// Pitch sounded by fret `offset` on this string (0 = open string).
    pub fn pitch_at(&self, offset: usize) -> i32 {
        self.base_note as i32 + offset as i32
    }
}

// ─── Audio handshake ────────────────────────────────────────────────────────

/// Identifies one triggered note on one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteToken {
    pub string: usize,
    pub generation: u64,
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

/// One connected page, numbered by the server in connection order.
pub type PageId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Hover,
    Click,
}

/// Everything the coordinator reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer entered or clicked the fret at `offset` (0 = open string).
    Pointer {
        string: usize,
        offset: usize,
        kind: PointerKind,
    },
    /// Raw value read from the mode selector.
    SelectMode(String),
    ChordTrigger,
    /// Display refresh on `page`, `t_ms` milliseconds on that page's clock.
    Frame { page: PageId, t_ms: f64 },
    /// `page` was hidden.
    PauseAnimation(PageId),
    /// `page` is visible again.
    ResumeAnimation(PageId),
    PageOpened(PageId),
    PageClosed(PageId),
    /// A voice finished its release.
    Silence(NoteToken),
}

// ─── Animation output ───────────────────────────────────────────────────────

/// Visual state of one string for one animation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringFrame {
    pub playing: bool,
    pub current_note: Option<u8>,
    /// Center y of each circular fret (and its label), offsets 1..fret_count-1.
    pub fret_y: Vec<f64>,
    /// Stroke width of each circular fret, same indexing as `fret_y`.
    pub fret_stroke: Vec<f64>,
    /// Stroke width of the open-string rectangle.
    pub open_stroke: f64,
}

/// Complete visual update produced by one animation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    /// Milliseconds since the animation loop was (re)started.
    pub elapsed_ms: f64,
    pub mode: Mode,
    /// True on the first tick after the mode changed.
    pub mode_changed: bool,
    pub strings: Vec<StringFrame>,
}

/// Short-key representation streamed to the page.
/// m=mode, mc=mode_changed, s=strings (p=playing, n=current_note,
/// y=fret_y, w=fret_stroke, o=open_stroke)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactFrame {
    pub m: Mode,
    pub mc: bool,
    pub s: Vec<CompactString>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactString {
    pub p: bool,
    pub n: Option<u8>,
    pub y: Vec<f32>,
    pub w: Vec<u8>,
    pub o: u8,
}

impl From<&FrameUpdate> for CompactFrame {
    fn from(f: &FrameUpdate) -> Self {
        Self {
            m: f.mode,
            mc: f.mode_changed,
            s: f
                .strings
                .iter()
                .map(|s| CompactString {
                    p: s.playing,
                    n: s.current_note,
                    y: s.fret_y.iter().map(|&y| y as f32).collect(),
                    w: s.fret_stroke.iter().map(|&w| w as u8).collect(),
                    o: s.open_stroke as u8,
                })
                .collect(),
        }
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

pub const DEFAULT_FRET_COUNT: usize = 22;
pub const DEFAULT_STRING_COUNT: usize = 6;

/// Standard tuning, string 0 = high E.
pub const DEFAULT_TUNING: [u8; 6] = [64, 59, 55, 50, 45, 40];

/// 1280x720 scaled by 37/32 and halved. Keep the aspect ratio when resizing.
pub const DEFAULT_WIDTH: f64 = 740.0;
pub const DEFAULT_HEIGHT: f64 = 416.25;

pub const PALETTE: [&str; 6] = ["crimson", "orangered", "gold", "green", "blue", "purple"];
pub const BOARD_COLOR: &str = "#d1a779";
pub const TARGET_STROKE: &str = "cyan";
pub const HIGHLIGHT_STROKE_WIDTH: f64 = 3.0;

/// Fret offsets carrying one inlay dot.
pub const SINGLE_MARK_POSITIONS: [usize; 8] = [3, 5, 7, 9, 15, 17, 19, 21];
/// Fret offsets carrying two inlay dots.
pub const DOUBLE_MARK_POSITIONS: [usize; 1] = [12];

pub const DEFAULT_NOTE_DURATION: &str = "3n";
pub const DEFAULT_BPM: f64 = 120.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("strum".parse::<Mode>().unwrap(), Mode::Strum);
        assert_eq!(" chord ".parse::<Mode>().unwrap(), Mode::Chord);
        assert!(matches!("banjo".parse::<Mode>(), Err(FretboardError::InvalidMode(_))));
        for m in Mode::ALL {
            assert_eq!(m.as_str().parse::<Mode>().unwrap(), m);
        }
    }

    #[test]
    fn test_compact_frame_keys() {
        let frame = FrameUpdate {
            elapsed_ms: 16.0,
            mode: Mode::Chord,
            mode_changed: true,
            strings: vec![StringFrame {
                playing: true,
                current_note: Some(52),
                fret_y: vec![34.6, 30.1],
                fret_stroke: vec![0.0, 3.0],
                open_stroke: 0.0,
            }],
        };
        let json = serde_json::to_string(&CompactFrame::from(&frame)).unwrap();
        assert!(json.contains("\"m\":\"chord\""));
        assert!(json.contains("\"mc\":true"));
        assert!(json.contains("\"n\":52"));
        assert!(json.contains("\"w\":[0,3]"));
    }
}
