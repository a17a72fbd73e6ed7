use crate::geometry::Geometry;
use crate::interaction::Fretboard;
use crate::types::{FrameUpdate, Mode, StringFrame, HIGHLIGHT_STROKE_WIDTH};
use log::{debug, info};

/// Turns fretboard state into per-frame visuals: wiggling frets on sounding
/// strings and the chord-mode highlight.
///
/// Driven by host display refreshes rather than its own timer. Each tick
/// carries the host's timestamp; the first tick after `start` becomes the
/// time origin.
pub struct Animator {
    geometry: Geometry,
    running: bool,
    origin_ms: Option<f64>,
    prev_mode: Option<Mode>,
    ticks: u64,
}

impl Animator {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            running: false,
            origin_ms: None,
            prev_mode: None,
            ticks: 0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            info!("Animation started");
        }
        self.running = true;
        self.origin_ms = None;
    }

    pub fn stop(&mut self) {
        if self.running {
            info!("Animation stopped after {} ticks", self.ticks);
        }
        self.running = false;
    }

    /// One refresh at host time `now_ms`. None while stopped.
    pub fn tick(&mut self, now_ms: f64, board: &Fretboard) -> Option<FrameUpdate> {
        if !self.running {
            return None;
        }
        let origin = *self.origin_ms.get_or_insert(now_ms);
        let elapsed_ms = (now_ms - origin).max(0.0);
        self.ticks += 1;

        let mode = board.mode();
        let mode_changed = self.prev_mode.is_some_and(|p| p != mode);
        self.prev_mode = Some(mode);
        if mode_changed {
            debug!("Tick {}: mode now {}", self.ticks, mode);
        }

        let g = &self.geometry;
        let strings = board
            .strings()
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let highlight = |pitch: i32| {
                    if mode == Mode::Chord && s.current_note.map(i32::from) == Some(pitch) {
                        HIGHLIGHT_STROKE_WIDTH
                    } else {
                        0.0
                    }
                };
                let offsets = g.circle_offsets();
                StringFrame {
                    playing: s.playing,
                    current_note: s.current_note,
                    fret_y: offsets
                        .clone()
                        .map(|d| {
                            let dy = if board.is_playing(i, d) { g.wiggle(d, elapsed_ms) } else { 0.0 };
                            g.center_line + dy
                        })
                        .collect(),
                    fret_stroke: offsets.map(|d| highlight(s.pitch_at(d))).collect(),
                    open_stroke: highlight(s.pitch_at(0)),
                }
            })
            .collect();

        Some(FrameUpdate {
            elapsed_ms,
            mode,
            mode_changed,
            strings,
        })
    }
}
