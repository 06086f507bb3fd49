//! The board: trigger rows, stop-all and the open volume editor.

use dioxus::prelude::*;

use super::{SoundRow, VolumeEditor};
use crate::services::BoardService;
use crate::state::{AppState, Board};

#[component]
pub fn BoardView() -> Element {
    let service = use_context::<BoardService>();
    let board = use_context::<Board>();
    let app_state = use_context::<AppState>();

    let sounds = app_state.sounds.read().clone();
    let editing = app_state
        .editing
        .read()
        .as_deref()
        .and_then(|id| app_state.sound(id));
    let status = app_state.status.read().clone();

    rsx! {
        div { class: "board",
            header { class: "board__header",
                h1 { class: "board__title", "{board.title()}" }
                button {
                    class: "board__stop-all",
                    onclick: move |_| service.stop_all(),
                    "Stop all sounds"
                }
            }

            div { class: "board__sounds",
                if sounds.is_empty() {
                    p { class: "board__empty", "No sounds on this board." }
                }
                for entry in sounds {
                    SoundRow { key: "{entry.id}", entry }
                }
            }

            if let Some(entry) = editing {
                VolumeEditor { key: "{entry.id}", entry }
            }

            footer { class: "board__status", "{status}" }
        }
    }
}
