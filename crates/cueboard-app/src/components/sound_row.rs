//! One trigger button on the board.

use std::sync::Arc;

use cueboard_audio::Indicator;
use cueboard_controls::TriggerControl;
use dioxus::prelude::*;
use tokio::sync::Mutex;

use crate::services::BoardService;
use crate::state::{AppState, SoundEntry};

/// Trigger button, current volume and an edit button for one sound.
#[component]
pub fn SoundRow(entry: SoundEntry) -> Element {
    let service = use_context::<BoardService>();
    let app_state = use_context::<AppState>();
    let mut editing = app_state.editing;

    let (trigger, indicator, owner) = use_hook(|| {
        let trigger = TriggerControl::new(service.coordinator(), entry.source.clone(), entry.volume);
        service.register(trigger.id(), &entry.id);
        let indicator = trigger.watch_indicator();
        let owner = trigger.id();
        (Arc::new(Mutex::new(trigger)), indicator, owner)
    });

    // Mirror the coordinator's view of this trigger into the icon
    let mut playing = use_signal(|| false);
    use_future(move || {
        let mut indicator = indicator.clone();
        async move {
            loop {
                let now = *indicator.borrow_and_update() == Indicator::Playing;
                playing.set(now);
                if indicator.changed().await.is_err() {
                    break;
                }
            }
        }
    });

    use_drop(move || service.unregister(owner));

    let click_entry = entry.clone();
    let edit_id = entry.id.clone();
    let icon = if playing() { "■" } else { "▶" };
    let is_editing = editing.read().as_deref() == Some(entry.id.as_str());

    rsx! {
        div { class: if playing() { "sound-row sound-row--playing" } else { "sound-row" },
            button {
                class: "sound-row__trigger",
                title: if playing() { "Stop" } else { "Play" },
                onclick: move |_| {
                    let trigger = trigger.clone();
                    let entry = click_entry.clone();
                    spawn(async move {
                        let mut trigger = trigger.lock().await;
                        trigger.set_source(entry.source.clone());
                        trigger.set_percent(entry.volume);
                        trigger.click().await;
                    });
                },
                "{icon}"
            }
            span { class: "sound-row__name", "{entry.name}" }
            span { class: "sound-row__volume", "{entry.volume}%" }
            button {
                class: if is_editing { "sound-row__edit sound-row__edit--active" } else { "sound-row__edit" },
                onclick: move |_| {
                    let id = edit_id.clone();
                    let next = if editing.read().as_deref() == Some(id.as_str()) { None } else { Some(id) };
                    editing.set(next);
                },
                "Edit"
            }
        }
    }
}
