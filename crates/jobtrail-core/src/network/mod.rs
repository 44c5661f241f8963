//! Online/offline connectivity signal.
//!
//! `ConnectivityMonitor` holds the current connectivity flag and publishes
//! an event on every real transition. Whatever knows about the network (the
//! CLI's offline mode switch, a platform hook) calls `set_online`; the sync
//! manager reads `is_online` and `AutoSync` subscribes to transitions.
//!
//! The signal is taken at face value: no debouncing and no liveness probe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

/// Capacity of the transition channel. Slow subscribers that fall further
/// behind see `Lagged` and should re-read `is_online`.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// An edge in the connectivity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

/// Shared connectivity state. Clones observe and feed the same signal.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    online: Arc<AtomicBool>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            online: Arc::new(AtomicBool::new(initially_online)),
            events,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feed a connectivity reading. Publishes an event only when the value
    /// changes; returns the event that was published, if any.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return None;
        }

        let event = if online {
            info!("Network: online");
            ConnectivityEvent::BecameOnline
        } else {
            warn!("Network: offline");
            ConnectivityEvent::BecameOffline
        };
        // No subscribers is fine; the flag itself is already updated
        let _ = self.events.send(event);
        Some(event)
    }

    /// Receive transitions published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}
