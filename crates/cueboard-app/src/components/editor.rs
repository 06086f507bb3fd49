//! Volume editor with preview for the selected sound.

use std::sync::Arc;
use std::time::Duration;

use cueboard_controls::{PreviewState, VolumeControl, VolumeDisplay};
use cueboard_core::{LocalFile, PreviewKind, PreviewSpec, SourceDescriptor};
use dioxus::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::services::BoardService;
use crate::state::{AppState, SoundEntry};

type SharedControl = Arc<Mutex<VolumeControl>>;

fn preview_spec(kind: PreviewKind, stored: &SourceDescriptor, url: &str) -> PreviewSpec {
    match kind {
        PreviewKind::Existing => PreviewSpec::Existing {
            source: stored.clone(),
        },
        PreviewKind::EnteredUrl => PreviewSpec::EnteredUrl {
            url: url.to_string(),
        },
        PreviewKind::LocalFile => PreviewSpec::LocalFile,
    }
}

const fn kind_value(kind: PreviewKind) -> &'static str {
    match kind {
        PreviewKind::Existing => "existing",
        PreviewKind::EnteredUrl => "url",
        PreviewKind::LocalFile => "file",
    }
}

fn parse_kind(value: &str) -> PreviewKind {
    match value {
        "url" => PreviewKind::EnteredUrl,
        "file" => PreviewKind::LocalFile,
        _ => PreviewKind::Existing,
    }
}

/// Apply a new preview choice to the control.
fn reconcile(control: SharedControl, kind: PreviewKind, stored: SourceDescriptor, url: String) {
    spawn(async move {
        let mut control = control.lock().await;
        let config = control
            .config()
            .clone()
            .with_percent(control.percent())
            .with_preview(preview_spec(kind, &stored, &url));
        if let Err(e) = control.reconcile(config).await {
            warn!("Rejected preview settings: {e}");
        }
    });
}

/// Slider, preview button and preview source picker for one sound.
#[component]
pub fn VolumeEditor(entry: SoundEntry) -> Element {
    let service = use_context::<BoardService>();
    let app_state = use_context::<AppState>();
    let mut editing = app_state.editing;

    let control: Option<(SharedControl, u32, VolumeDisplay)> = use_hook(|| {
        let config = service
            .control_config(&entry.id, entry.volume)
            .with_preview(PreviewSpec::Existing {
                source: entry.source.clone(),
            });
        match VolumeControl::new(
            config,
            service.coordinator(),
            service.notifier(),
            service.debounce(),
        ) {
            Ok(control) => {
                let percent = control.percent();
                let display = control.display().clone();
                Some((Arc::new(Mutex::new(control)), percent, display))
            }
            Err(e) => {
                error!("Cannot edit {}: {e}", entry.id);
                None
            }
        }
    });

    let Some((control, initial, initial_display)) = control else {
        return rsx! {
            div { class: "editor editor--error", "This sound cannot be edited." }
        };
    };

    let max_percent = service.settings().default_max_percent;
    let mut percent = use_signal(|| initial);
    let mut display = use_signal(|| initial_display);
    let mut preview = use_signal(PreviewState::default);
    let mut kind = use_signal(|| PreviewKind::Existing);
    let mut url_text = use_signal(String::new);
    let mut file_note = use_signal(String::new);

    // Previews end on their own; keep the button in step.
    let watched = control.clone();
    use_future(move || {
        let control = watched.clone();
        async move {
            loop {
                if let Ok(control) = control.try_lock() {
                    if *preview.peek() != control.preview_state() {
                        preview.set(control.preview_state());
                    }
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    });

    let slider_control = control.clone();
    let preview_control = control.clone();
    let kind_control = control.clone();
    let url_control = control.clone();
    let file_control = control.clone();
    let kind_source = entry.source.clone();
    let url_source = entry.source.clone();

    let state = display.read().clone();
    let thumb_left = state.thumb_left();
    let fill = state.fraction * 100.0;

    rsx! {
        div { class: "editor",
            div { class: "editor__header",
                span { class: "editor__title", "Volume: {entry.name}" }
                button {
                    class: "editor__close",
                    onclick: move |_| editing.set(None),
                    "×"
                }
            }

            div { class: "editor__slider",
                input {
                    r#type: "range",
                    min: "0",
                    max: "{max_percent}",
                    value: "{percent}",
                    oninput: move |evt: FormEvent| {
                        let control = slider_control.clone();
                        let raw = evt.value();
                        spawn(async move {
                            let mut control = control.lock().await;
                            percent.set(control.set_percent(raw, true).await);
                            display.set(control.display().clone());
                        });
                    },
                }
                div { class: "editor__track",
                    div { class: "editor__fill", style: "width: {fill}%" }
                    div { class: "editor__thumb", style: "left: {thumb_left}" }
                }
                span { class: "editor__label", "{state.label}" }
            }

            div { class: "editor__preview",
                button {
                    class: if preview() == PreviewState::Playing { "editor__preview-btn editor__preview-btn--playing" } else { "editor__preview-btn" },
                    onclick: move |_| {
                        let control = preview_control.clone();
                        spawn(async move {
                            let state = control.lock().await.toggle_preview().await;
                            preview.set(state);
                        });
                    },
                    if preview() == PreviewState::Playing { "Stop preview" } else { "Preview" }
                }

                select {
                    value: kind_value(kind()),
                    onchange: move |evt: FormEvent| {
                        let next = parse_kind(&evt.value());
                        kind.set(next);
                        preview.set(PreviewState::Stopped);
                        reconcile(kind_control.clone(), next, kind_source.clone(), url_text());
                    },
                    option { value: "existing", "Stored sound" }
                    option { value: "url", "URL" }
                    option { value: "file", "Local file" }
                }

                if kind() == PreviewKind::EnteredUrl {
                    input {
                        r#type: "url",
                        placeholder: "https://…",
                        value: "{url_text}",
                        onchange: move |evt: FormEvent| {
                            let url = evt.value();
                            url_text.set(url.clone());
                            preview.set(PreviewState::Stopped);
                            reconcile(url_control.clone(), PreviewKind::EnteredUrl, url_source.clone(), url);
                        },
                    }
                }

                if kind() == PreviewKind::LocalFile {
                    input {
                        r#type: "text",
                        placeholder: "Path to an audio file",
                        onchange: move |evt: FormEvent| {
                            let path = evt.value();
                            let control = file_control.clone();
                            spawn(async move {
                                let selected = if path.trim().is_empty() {
                                    Ok(None)
                                } else {
                                    LocalFile::from_path(path.trim()).map(Some)
                                };
                                let note = match selected {
                                    Ok(file) => {
                                        let name = file.as_ref().map(LocalFile::name);
                                        match control.lock().await.select_file(file) {
                                            Ok(()) => name.unwrap_or_default(),
                                            Err(e) => format!("{e}"),
                                        }
                                    }
                                    Err(e) => format!("{e}"),
                                };
                                preview.set(PreviewState::Stopped);
                                file_note.set(note);
                            });
                        },
                    }
                    span { class: "editor__note", "{file_note}" }
                }
            }
        }
    }
}
