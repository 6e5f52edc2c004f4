//! Online/offline state fed by the platform's network-status signal.
//!
//! The monitor is told about changes; it never polls. Subscribers only see
//! edges: reporting the current state again does not notify anyone.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    WentOnline,
    WentOffline,
}

impl fmt::Display for ConnectivityEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityEdge::WentOnline => write!(f, "offline -> online"),
            ConnectivityEdge::WentOffline => write!(f, "online -> offline"),
        }
    }
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// `initial` is the platform signal read once at start-up.
    pub fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a platform transition. Returns the edge if the state changed.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEdge> {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return None;
        }
        let edge = if online {
            ConnectivityEdge::WentOnline
        } else {
            ConnectivityEdge::WentOffline
        };
        info!(%edge, "connectivity changed");
        Some(edge)
    }

    pub fn subscribe(&self) -> ConnectivityWatch {
        let rx = self.tx.subscribe();
        let last = *rx.borrow();
        ConnectivityWatch { rx, last }
    }
}

/// Subscriber side of a [`ConnectivityMonitor`].
#[derive(Debug, Clone)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
    last: bool,
}

impl ConnectivityWatch {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Non-blocking: the net edge since the last call, if any. A flap that
    /// ends where it started yields nothing.
    pub fn take_edge(&mut self) -> Option<ConnectivityEdge> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        let now = *self.rx.borrow_and_update();
        self.edge_to(now)
    }

    /// Waits for the next edge. `None` once the monitor is gone.
    pub async fn next_edge(&mut self) -> Option<ConnectivityEdge> {
        loop {
            self.rx.changed().await.ok()?;
            let now = *self.rx.borrow_and_update();
            if let Some(edge) = self.edge_to(now) {
                return Some(edge);
            }
        }
    }

    fn edge_to(&mut self, now: bool) -> Option<ConnectivityEdge> {
        if now == self.last {
            return None;
        }
        self.last = now;
        Some(if now {
            ConnectivityEdge::WentOnline
        } else {
            ConnectivityEdge::WentOffline
        })
    }
}
