//! Board-level scenarios: several triggers and volume controls sharing one
//! coordinator and one backend.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;
use std::time::Duration;

use cueboard_audio::mock::{JournalEntry, MockBackend};
use cueboard_audio::{
    AudioResource, CoordinatorEvent, Indicator, PlaybackCoordinator, ProcessingContext,
    StopReason,
};
use cueboard_controls::{PreviewState, TriggerControl, VolumeControl};
use cueboard_core::gain::percent_to_gain;
use cueboard_core::{
    ChannelNotifier, ControlConfig, LocalFile, PreviewSpec, Settings, SourceDescriptor,
    VolumeChanged, DEFAULT_MAX_PERCENT,
};
use crossbeam_channel::Receiver;

struct Board {
    backend: MockBackend,
    coordinator: PlaybackCoordinator,
    notifier: Arc<ChannelNotifier>,
    events: Receiver<(String, VolumeChanged)>,
}

impl Board {
    fn new() -> Self {
        let backend = MockBackend::new();
        let settings = Settings::default();
        let coordinator = PlaybackCoordinator::new(Arc::new(backend.clone()), &settings);
        let (notifier, events) = ChannelNotifier::new();
        Self {
            backend,
            coordinator,
            notifier: Arc::new(notifier),
            events,
        }
    }

    fn trigger(&self, filename: &str) -> TriggerControl {
        TriggerControl::new(
            &self.coordinator,
            SourceDescriptor::Upload(filename.to_string()),
            100,
        )
    }

    fn control(&self, config: ControlConfig) -> VolumeControl {
        VolumeControl::new(
            config,
            &self.coordinator,
            self.notifier.clone(),
            Settings::default().debounce(),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_second_trigger_takes_over() {
    let board = Board::new();
    let a = board.trigger("airhorn.mp3");
    let b = board.trigger("rimshot.mp3");
    let mut events = board.coordinator.subscribe();

    assert_eq!(a.click().await, Indicator::Playing);
    assert_eq!(b.click().await, Indicator::Playing);

    assert_eq!(a.indicator(), Indicator::Stopped);
    assert_eq!(b.indicator(), Indicator::Playing);
    assert_eq!(board.coordinator.active_owner(), Some(b.id()));

    let playing: Vec<_> = board
        .backend
        .resources()
        .into_iter()
        .filter(|r| !r.is_paused())
        .collect();
    assert_eq!(playing.len(), 1);
    assert_eq!(playing[0].source().as_deref(), Some("/uploads/rimshot.mp3"));

    assert_eq!(
        events.recv().await.unwrap(),
        CoordinatorEvent::Started { owner: a.id() }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoordinatorEvent::Stopped {
            owner: a.id(),
            reason: StopReason::Superseded
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoordinatorEvent::Started { owner: b.id() }
    );
}

#[tokio::test]
async fn test_stop_all_silences_board() {
    let board = Board::new();
    let a = board.trigger("airhorn.mp3");
    a.click().await;

    board.coordinator.stop_all();
    board.coordinator.stop_all();

    assert_eq!(a.indicator(), Indicator::Stopped);
    assert!(board.coordinator.active_owner().is_none());
    assert!(board.backend.resources().iter().all(|r| r.is_paused()));
}

#[tokio::test]
async fn test_clip_end_resets_trigger() {
    let board = Board::new();
    let a = board.trigger("airhorn.mp3");
    let mut indicator = a.watch_indicator();
    a.click().await;
    let _ = indicator.borrow_and_update();

    board.backend.resources()[0].finish();
    indicator.changed().await.unwrap();

    assert_eq!(*indicator.borrow(), Indicator::Stopped);
    assert!(board.coordinator.active_owner().is_none());
    // Clicking again starts a fresh session.
    assert_eq!(a.click().await, Indicator::Playing);
}

#[tokio::test]
async fn test_preview_does_not_interrupt_triggers() {
    let board = Board::new();
    let a = board.trigger("airhorn.mp3");
    a.click().await;

    let mut control = board.control(ControlConfig::new(150).with_preview(PreviewSpec::Existing {
        source: SourceDescriptor::Upload("rimshot.mp3".into()),
    }));
    assert_eq!(control.toggle_preview().await, PreviewState::Playing);

    assert_eq!(board.coordinator.active_owner(), Some(a.id()));
    assert_eq!(a.indicator(), Indicator::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_three_quick_drags_notify_once() {
    let board = Board::new();
    let mut control = board.control(ControlConfig::new(150).with_target("sound-3"));

    control.set_percent(120, true).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    control.set_percent(125, true).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    control.set_percent(131, true).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    let received: Vec<_> = board.events.try_iter().collect();
    assert_eq!(
        received,
        vec![(
            "volume_changed".to_string(),
            VolumeChanged {
                volume: 131,
                target: Some("sound-3".to_string())
            }
        )]
    );
}

#[tokio::test]
async fn test_gain_scenarios() {
    assert_eq!(percent_to_gain(0, DEFAULT_MAX_PERCENT), 0.0);
    assert_eq!(percent_to_gain(100, DEFAULT_MAX_PERCENT), 1.0);
    assert_eq!(percent_to_gain(149, DEFAULT_MAX_PERCENT), 1.49);

    let board = Board::new();
    let preview = PreviewSpec::EnteredUrl {
        url: "https://cdn.test/boom.wav".into(),
    };

    let mut silent = board.control(ControlConfig::new(150).with_percent(0).with_preview(preview.clone()));
    silent.toggle_preview().await;
    let quiet = board.backend.resources()[0].clone();
    assert_eq!(quiet.volume(), 0.0);
    assert_eq!(board.backend.contexts_created(), 0);

    let mut loud = board.control(ControlConfig::new(150).with_percent(150).with_preview(preview));
    loud.toggle_preview().await;
    let boosted = board.backend.resources()[1].clone();
    assert_eq!(loud.gain(), 1.5);
    assert_eq!(boosted.volume(), 1.0);
    assert_eq!(board.backend.contexts_created(), 1);
    let context = board.backend.context().unwrap();
    assert_eq!(context.gain_of(boosted.id()), Some(1.5));
    assert!(!context.is_suspended());
}

#[tokio::test]
async fn test_near_unity_snaps_before_gain() {
    let board = Board::new();
    let mut control = board.control(ControlConfig::new(150));
    for raw in [98, 99, 101, 102] {
        assert_eq!(control.set_percent(raw, false).await, 100);
        assert_eq!(control.gain(), 1.0);
    }
    assert_eq!(control.set_percent(97, false).await, 97);
    assert_eq!(control.set_percent(103, false).await, 103);
}

#[tokio::test]
async fn test_reselecting_file_revokes_previous_reference_first() {
    let board = Board::new();
    let mut control = board.control(ControlConfig::new(150).with_preview(PreviewSpec::LocalFile));

    control
        .select_file(Some(LocalFile::new("/tmp/f1.wav", 100, None)))
        .unwrap();
    control
        .select_file(Some(LocalFile::new("/tmp/f2.wav", 200, None)))
        .unwrap();

    let journal = board.backend.journal();
    let [JournalEntry::Created(f1, p1), JournalEntry::Revoked(revoked), JournalEntry::Created(_, p2)] =
        journal.as_slice()
    else {
        panic!("unexpected journal {journal:?}");
    };
    assert_eq!(revoked, f1);
    assert_eq!(p1.to_str(), Some("/tmp/f1.wav"));
    assert_eq!(p2.to_str(), Some("/tmp/f2.wav"));
}

#[tokio::test]
async fn test_stop_without_session_is_noop() {
    let board = Board::new();
    let a = board.trigger("airhorn.mp3");
    let mut events = board.coordinator.subscribe();

    assert!(!board.coordinator.request_stop(a.id()));
    let control = board.control(ControlConfig::new(150));
    control.stop_preview();

    assert_eq!(a.indicator(), Indicator::Stopped);
    assert!(events.try_recv().is_err());
    assert!(board.backend.resources().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_control_cleans_up() {
    let board = Board::new();
    let mut control = board.control(
        ControlConfig::new(150)
            .with_percent(140)
            .with_preview(PreviewSpec::LocalFile),
    );
    control
        .select_file(Some(LocalFile::new("/tmp/take.wav", 1, None)))
        .unwrap();
    control.toggle_preview().await;
    control.set_percent(145, true).await;
    let resource = board.backend.resources()[0].clone();

    drop(control);

    assert!(resource.is_paused());
    assert!(board.backend.live_object_urls().is_empty());
    assert!(!board.backend.context().unwrap().is_routed(resource.id()));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(board.events.try_recv().is_err());
}
