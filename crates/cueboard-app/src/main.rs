//! # Cueboard
//!
//! A desktop soundboard: one sound at a time, volume up to 150%.

// RSX macros generate code that triggers these warnings incorrectly
#![allow(unused_qualifications)]
#![allow(clippy::use_self)]

mod components;
mod services;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use components::BoardView;
use cueboard_core::Settings;
use dioxus::desktop::{Config, WindowBuilder};
use dioxus::prelude::*;
use services::{use_board_sync, BoardService};
use state::{AppState, Board};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WINDOW_WIDTH: f64 = 420.0;
const WINDOW_HEIGHT: f64 = 640.0;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cueboard=debug,cueboard_app=debug,cueboard_controls=debug,cueboard_audio=info"
                    .into()
            }),
        )
        .init();

    info!("Starting Cueboard v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load().context("loading settings")?;

    // Board file from the first argument, otherwise the sample board
    let board = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Board::load(&path)?,
        None => Board::sample(),
    };
    info!("Board '{}' with {} sounds", board.title(), board.sounds.len());

    let service = BoardService::start(settings).context("starting audio")?;

    let window_builder = WindowBuilder::new()
        .with_title(board.title())
        .with_inner_size(dioxus::desktop::LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
        .with_resizable(true);

    let config = Config::new()
        .with_window(window_builder)
        .with_disable_context_menu(true)
        .with_menu(None);

    dioxus::LaunchBuilder::desktop()
        .with_cfg(config)
        .with_context(service)
        .with_context(board)
        .launch(App);

    Ok(())
}

#[component]
fn App() -> Element {
    let board = use_context::<Board>();
    let service = use_context::<BoardService>();

    let app_state = use_context_provider(|| AppState::new(&board));
    use_board_sync(service, app_state);

    rsx! {
        style { {include_str!("../assets/styles.css")} }

        div { class: "app",
            BoardView {}
        }
    }
}
