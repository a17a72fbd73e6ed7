use std::fmt;
use std::io;

/// Everything that can go wrong between the page, the state machine and the voices.
///
/// None of these are fatal once the session is running: the coordinator logs
/// them and keeps draining events.
#[derive(Debug)]
pub enum FretboardError {
    /// MIDI pitch outside 0..=127.
    InvalidPitch(i32),
    /// Mode selector value that is not `fret`, `strum` or `chord`.
    InvalidMode(String),
    /// String index past the configured string count.
    InvalidString(usize),
    /// Note duration token that could not be parsed.
    InvalidDuration(String),
    /// Chord shape that could not be parsed or does not fit the tuning.
    InvalidChord(String),
    Config(String),
    Audio(String),
    Io(io::Error),
}

impl fmt::Display for FretboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FretboardError::InvalidPitch(p) => write!(f, "MIDI pitch {p} out of range 0..=127"),
            FretboardError::InvalidMode(m) => write!(f, "Unknown mode '{m}'"),
            FretboardError::InvalidString(i) => write!(f, "No string with index {i}"),
            FretboardError::InvalidDuration(d) => write!(f, "Invalid note duration '{d}'"),
            FretboardError::InvalidChord(c) => write!(f, "Invalid chord shape: {c}"),
            FretboardError::Config(msg) => write!(f, "Config error: {msg}"),
            FretboardError::Audio(msg) => write!(f, "Audio error: {msg}"),
            FretboardError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for FretboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FretboardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FretboardError {
    fn from(e: io::Error) -> Self {
        FretboardError::Io(e)
    }
}

impl From<serde_json::Error> for FretboardError {
    fn from(e: serde_json::Error) -> Self {
        FretboardError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FretboardError>;
