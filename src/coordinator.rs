use crate::animation::Animator;
use crate::interaction::{Fretboard, NoteSink};
use crate::types::*;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, trace, warn};

/// Connected pages in connection order, with their visibility.
///
/// Only one page drives the animation clock: the newest one that is not
/// hidden. Every page still receives the frames it produces.
#[derive(Debug, Default)]
struct Pages {
    open: Vec<(PageId, bool)>,
}

impl Pages {
    fn driver(&self) -> Option<PageId> {
        self.open.iter().rev().find(|(_, hidden)| !hidden).map(|&(id, _)| id)
    }

    /// With no pages registered any sender drives, so the loop also works
    /// when events come straight from code rather than through the server.
    fn drives(&self, page: PageId) -> bool {
        self.open.is_empty() || self.driver() == Some(page)
    }

    fn set_hidden(&mut self, page: PageId, hidden: bool) {
        if let Some(p) = self.open.iter_mut().find(|(id, _)| *id == page) {
            p.1 = hidden;
        }
    }
}

/// The single thread that owns the fretboard.
///
/// Drains one channel carrying page events, host refresh ticks and voice
/// silence notifications, so every state change happens here in arrival
/// order. Each tick's `FrameUpdate` goes to every frame consumer.
pub struct Coordinator<S: NoteSink> {
    input_rx: Receiver<InputEvent>,
    frame_txs: Vec<Sender<FrameUpdate>>,
    board: Fretboard,
    animator: Animator,
    sink: S,
    pages: Pages,
}

impl<S: NoteSink> Coordinator<S> {
    pub fn new(
        input_rx: Receiver<InputEvent>,
        frame_txs: Vec<Sender<FrameUpdate>>,
        board: Fretboard,
        animator: Animator,
        sink: S,
    ) -> Self {
        Self {
            input_rx,
            frame_txs,
            board,
            animator,
            sink,
            pages: Pages::default(),
        }
    }

    pub fn board(&self) -> &Fretboard {
        &self.board
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until every input sender is dropped. Returns the final state.
    pub fn run(mut self) -> (Fretboard, S) {
        info!("Coordinator running ({} mode)", self.board.mode());
        self.animator.start();

        let mut events: u64 = 0;
        let mut frames: u64 = 0;
        while let Ok(event) = self.input_rx.recv() {
            events += 1;
            if self.handle(event) {
                frames += 1;
                if frames % 600 == 0 {
                    debug!("Coordinator: {} frames, {} events", frames, events);
                }
            }
        }

        info!("Coordinator shutting down after {} events ({} frames)", events, frames);
        (self.board, self.sink)
    }

    /// Apply one event. Returns true if a frame was published.
    pub fn handle(&mut self, event: InputEvent) -> bool {
        trace!("Event: {:?}", event);
        match event {
            InputEvent::Pointer { string, offset, kind } => {
                let result = match kind {
                    PointerKind::Hover => self.board.hover(string, offset, &mut self.sink),
                    PointerKind::Click => self.board.click(string, offset, &mut self.sink),
                };
                if let Err(e) = result {
                    warn!("{:?} on string {} fret {}: {}", kind, string, offset, e);
                }
            }
            InputEvent::SelectMode(raw) => {
                if let Err(e) = self.board.select_mode(&raw) {
                    warn!("{}; staying in {} mode", e, self.board.mode());
                }
            }
            InputEvent::ChordTrigger => {
                let tokens = self.board.play_chord(&mut self.sink);
                if !tokens.is_empty() {
                    info!("Chord: {} strings", tokens.len());
                }
            }
            InputEvent::Silence(token) => {
                self.board.on_silence(token);
            }
            InputEvent::PageOpened(page) => {
                let before = self.pages.driver();
                self.pages.open.push((page, false));
                self.change_driver(before);
                info!("Page {} connected, {} open", page, self.pages.open.len());
            }
            InputEvent::PageClosed(page) => {
                let before = self.pages.driver();
                self.pages.open.retain(|&(id, _)| id != page);
                self.change_driver(before);
                info!("Page {} closed, {} open", page, self.pages.open.len());
            }
            InputEvent::PauseAnimation(page) => {
                if self.pages.open.is_empty() {
                    self.animator.stop();
                } else {
                    let before = self.pages.driver();
                    self.pages.set_hidden(page, true);
                    self.change_driver(before);
                }
            }
            InputEvent::ResumeAnimation(page) => {
                if self.pages.open.is_empty() {
                    self.animator.start();
                } else {
                    let before = self.pages.driver();
                    self.pages.set_hidden(page, false);
                    self.change_driver(before);
                }
            }
            InputEvent::Frame { page, t_ms } => {
                if !self.pages.drives(page) {
                    return false;
                }
                if let Some(frame) = self.animator.tick(t_ms, &self.board) {
                    for tx in &self.frame_txs {
                        let _ = tx.send(frame.clone());
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Each page ticks on its own clock, so a new driver restarts the time
    /// origin. No visible page left stops the loop.
    fn change_driver(&mut self, before: Option<PageId>) {
        let after = self.pages.driver();
        if after == before {
            return;
        }
        match after {
            Some(page) => {
                debug!("Page {} now drives the animation", page);
                self.animator.start();
            }
            None => self.animator.stop(),
        }
    }
}
