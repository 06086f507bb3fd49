//! Notifications pushed back to the host page.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Payload of a committed volume change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeChanged {
    /// Committed percent.
    pub volume: u32,
    /// Component the event is addressed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Receiver of host-bound events.
pub trait HostNotifier: Send + Sync {
    fn push_event(&self, event: &str, payload: VolumeChanged);
}

/// Notifier that forwards events over a channel for the host to poll.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<(String, VolumeChanged)>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end the host polls.
    pub fn new() -> (Self, Receiver<(String, VolumeChanged)>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl HostNotifier for ChannelNotifier {
    fn push_event(&self, event: &str, payload: VolumeChanged) {
        if self.tx.send((event.to_string(), payload)).is_err() {
            warn!("Host went away, dropping {event} notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_omits_missing_target() {
        let payload = VolumeChanged {
            volume: 80,
            target: None,
        };
        assert_eq!(serde_json::to_string(&payload).unwrap(), r#"{"volume":80}"#);

        let payload = VolumeChanged {
            volume: 120,
            target: Some("sound-3".into()),
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"volume":120,"target":"sound-3"}"#
        );
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (notifier, rx) = ChannelNotifier::new();
        notifier.push_event(
            "volume_changed",
            VolumeChanged {
                volume: 42,
                target: None,
            },
        );
        let (event, payload) = rx.try_recv().unwrap();
        assert_eq!(event, "volume_changed");
        assert_eq!(payload.volume, 42);
    }
}
