//! Backend services integration.
//!
//! Connects the UI to the playback coordinator and collects committed
//! volume changes from the editors.

pub mod board;

pub use board::{use_board_sync, BoardService};
