//! Application state management.

pub mod board;

pub use board::{Board, SoundEntry};

use dioxus::prelude::*;

/// Global application state.
#[derive(Clone, Copy)]
pub struct AppState {
    /// Sounds on the board, volumes included.
    pub sounds: Signal<Vec<SoundEntry>>,
    /// Id of the sound whose volume editor is open.
    pub editing: Signal<Option<String>>,
    /// Last playback status line.
    pub status: Signal<String>,
}

impl AppState {
    pub fn new(board: &Board) -> Self {
        Self {
            sounds: Signal::new(board.sounds.clone()),
            editing: Signal::new(None),
            status: Signal::new(String::from("Ready")),
        }
    }

    pub fn sound(&self, id: &str) -> Option<SoundEntry> {
        self.sounds.read().iter().find(|s| s.id == id).cloned()
    }

    /// Store a committed volume for `id`.
    pub fn set_volume(&mut self, id: &str, volume: u32) -> bool {
        let mut sounds = self.sounds.write();
        match sounds.iter_mut().find(|s| s.id == id) {
            Some(sound) => {
                sound.volume = volume;
                true
            }
            None => false,
        }
    }

    pub fn name_of(&self, id: &str) -> String {
        self.sound(id).map_or_else(|| id.to_string(), |s| s.name)
    }
}
