//! Guitar tab chord shapes (`x32010`, `x-3-2-0-1-0`, `x 10 12 12 11 x`).
//!
//! Shapes are written low string first, the way tab books print them; the
//! fretboard indexes strings high string first, so `notes` reverses them.

use crate::error::{FretboardError, Result};
use crate::notes::validate_pitch;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordShape {
    /// Low string first; None = muted.
    frets: Vec<Option<usize>>,
}

impl ChordShape {
    pub fn frets(&self) -> &[Option<usize>] {
        &self.frets
    }

    /// One entry per string, high string first, ready for
    /// `Fretboard::select_chord`.
    pub fn notes(&self, tuning: &[u8], fret_count: usize) -> Result<Vec<Option<u8>>> {
        if self.frets.len() != tuning.len() {
            return Err(FretboardError::InvalidChord(format!(
                "shape '{}' has {} strings, tuning has {}",
                self,
                self.frets.len(),
                tuning.len()
            )));
        }
        tuning
            .iter()
            .zip(self.frets.iter().rev())
            .map(|(&base, fret)| match fret {
                None => Ok(None),
                Some(f) if *f + 1 >= fret_count => Err(FretboardError::InvalidChord(format!(
                    "fret {f} is past the last playable fret {}",
                    fret_count.saturating_sub(2)
                ))),
                Some(f) => validate_pitch(base as i32 + *f as i32).map(Some),
            })
            .collect()
    }
}

impl FromStr for ChordShape {
    type Err = FretboardError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let separated = s.contains(|c: char| c == '-' || c == ',' || c.is_whitespace());
        let parts: Vec<&str> = if separated {
            s.split(|c: char| c == '-' || c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect()
        } else {
            s.char_indices().map(|(i, c)| &s[i..i + c.len_utf8()]).collect()
        };
        if parts.is_empty() {
            return Err(FretboardError::InvalidChord("empty shape".into()));
        }

        let frets = parts
            .into_iter()
            .map(|p| match p {
                "x" | "X" => Ok(None),
                n => n
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| FretboardError::InvalidChord(format!("bad fret '{n}' in '{s}'"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { frets })
    }
}

impl fmt::Display for ChordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wide = self.frets.iter().any(|x| x.is_some_and(|n| n > 9));
        let parts: Vec<String> = self
            .frets
            .iter()
            .map(|x| x.map_or_else(|| "x".to_string(), |n| n.to_string()))
            .collect();
        f.write_str(&parts.join(if wide { "-" } else { "" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TUNING;

    #[test]
    fn test_compact_shape() {
        let c: ChordShape = "x32010".parse().unwrap();
        assert_eq!(c.frets(), &[None, Some(3), Some(2), Some(0), Some(1), Some(0)]);
        // C major: high E open, B1 = C, G open, D2 = E, A3 = C, low E muted
        assert_eq!(
            c.notes(&DEFAULT_TUNING, 22).unwrap(),
            vec![Some(64), Some(60), Some(55), Some(52), Some(48), None]
        );
        assert_eq!(c.to_string(), "x32010");
    }

    #[test]
    fn test_separated_shape() {
        let c: ChordShape = "x 10 12 12 11 x".parse().unwrap();
        assert_eq!(c.frets()[1], Some(10));
        assert_eq!(c.to_string(), "x-10-12-12-11-x");
        let dash: ChordShape = "3-2-0-0-0-3".parse().unwrap();
        assert_eq!(dash.notes(&DEFAULT_TUNING, 22).unwrap()[0], Some(67));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!("".parse::<ChordShape>().is_err());
        assert!("x3201q".parse::<ChordShape>().is_err());
        let short: ChordShape = "320".parse().unwrap();
        assert!(short.notes(&DEFAULT_TUNING, 22).is_err());
        let dead: ChordShape = "21-0-0-0-0-0".parse().unwrap();
        assert!(dead.notes(&DEFAULT_TUNING, 22).is_err());
        let top: ChordShape = "20-0-0-0-0-0".parse().unwrap();
        assert!(top.notes(&DEFAULT_TUNING, 22).is_ok());
    }
}
