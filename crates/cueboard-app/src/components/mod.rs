//! UI components.

mod board;
mod editor;
mod sound_row;

pub use board::BoardView;
pub use editor::VolumeEditor;
pub use sound_row::SoundRow;
