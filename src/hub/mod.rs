//! The hub: single event loop that owns membership.
//!
//! Register and unregister share one FIFO control channel, so a session's
//! leave can never be handled ahead of its join. Broadcasts come in on a
//! separate bounded intake. Events are handled one at a time, so membership
//! changes and fan-out never interleave. The playback state and the
//! watch-hours map are touched directly by sessions under their own locks and
//! do not go through this loop.

pub mod presence;

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::SendTimeoutError, WeakSender};
use tracing::{debug, info, warn};

use crate::{
    config::HubSettings,
    error::{AppErr, AppResult},
    message::Message,
    state::{SessionHandle, SessionId, SharedState},
};

/// Membership changes, in the order they were requested.
enum Control {
    Register(SessionHandle),
    Unregister(SessionId),
}

/// Cloneable entry point used by sessions, routes and tests.
#[derive(Clone)]
pub struct HubHandle {
    control:   mpsc::UnboundedSender<Control>,
    broadcast: mpsc::Sender<Message>,
    state:     Arc<SharedState>,
}

impl HubHandle {
    pub fn register(&self, session: SessionHandle) -> AppResult<()> {
        self.control.send(Control::Register(session)).map_err(|_| AppErr::HubClosed)
    }

    /// Safe to call any number of times for the same session.
    pub fn unregister(&self, id: SessionId) {
        let _ = self.control.send(Control::Unregister(id));
    }

    /// Queue a message for fan-out. Waits if the intake is full.
    pub async fn broadcast(&self, msg: Message) -> AppResult<()> {
        self.broadcast.send(msg).await.map_err(|_| AppErr::HubClosed)
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub async fn member_count(&self) -> usize {
        self.state.members.read().await.len()
    }

    pub async fn member_names(&self) -> Vec<String> {
        presence::roster(&*self.state.members.read().await)
    }

    pub async fn is_member(&self, id: SessionId) -> bool {
        self.state.members.read().await.contains_key(&id)
    }

    pub async fn playback(&self) -> Message {
        self.state.playback.lock().await.clone()
    }

    pub async fn watch_hours(&self, name: &str) -> Option<f64> {
        self.state.watch_hours.lock().await.get(name).copied()
    }
}

pub struct Hub {
    settings:     HubSettings,
    state:        Arc<SharedState>,
    control_rx:   mpsc::UnboundedReceiver<Control>,
    control_tx:   mpsc::UnboundedSender<Control>,
    broadcast_rx: mpsc::Receiver<Message>,
}

impl Hub {
    pub fn new(settings: HubSettings) -> (Self, HubHandle) {
        let state = SharedState::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(settings.broadcast_capacity);

        let handle = HubHandle {
            control: control_tx.clone(),
            broadcast: broadcast_tx,
            state: state.clone(),
        };
        let hub = Self { settings, state, control_rx, control_tx, broadcast_rx };
        (hub, handle)
    }

    /// Build the hub and run its loop on a background task.
    pub fn spawn(settings: HubSettings) -> HubHandle {
        let (hub, handle) = Self::new(settings);
        tokio::spawn(hub.run());
        handle
    }

    pub async fn run(mut self) {
        info!("hub event loop started");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.control_rx.recv() => match event {
                    Control::Register(session) => self.on_register(session).await,
                    Control::Unregister(id) => self.on_unregister(id).await,
                },
                Some(msg) = self.broadcast_rx.recv() => self.on_broadcast(msg).await,
                else => break,
            }
        }
        info!("hub event loop stopped");
    }

    async fn on_register(&mut self, session: SessionHandle) {
        let (id, name, weak) = (session.id, session.name.clone(), session.weak_mailbox());
        let total = {
            let mut members = self.state.members.write().await;
            members.insert(id, session);
            members.len()
        };
        info!(session = %id, user = %name, total, "session registered");

        self.spawn_initial_state(id, name, weak);
        presence::publish(&self.state).await;
    }

    async fn on_unregister(&mut self, id: SessionId) {
        let removed = {
            let mut members = self.state.members.write().await;
            members.remove(&id).map(|s| (s, members.len()))
        };
        let Some((session, total)) = removed else {
            // already gone: the roster it would publish is the one already sent
            debug!(session = %id, "unregister for unknown session ignored");
            return;
        };
        info!(session = %id, user = %session.name, total, "session unregistered");
        session.close();
        presence::publish(&self.state).await;
    }

    async fn on_broadcast(&mut self, msg: Message) {
        debug!(kind = ?msg.kind, sender = ?msg.sender, "broadcasting");
        let evicted = {
            let mut members = self.state.members.write().await;
            let stale: Vec<SessionId> = members
                .values()
                .filter_map(|s| match s.try_deliver(msg.clone()) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(session = %s.id, user = %s.name, error = %e, "mailbox rejected broadcast, evicting");
                        Some(s.id)
                    }
                })
                .collect();
            for id in &stale {
                if let Some(session) = members.remove(id) {
                    session.close();
                }
            }
            stale.len()
        };
        if evicted > 0 {
            presence::publish(&self.state).await;
        }
    }

    /// Hand the current playback state to a new session off the event loop.
    /// Exhausted retries, or a panic in the sender, turn into an unregister.
    fn spawn_initial_state(&self, id: SessionId, name: String, mailbox: WeakSender<Message>) {
        let state = self.state.clone();
        let control = self.control_tx.clone();
        let attempts = self.settings.initial_state_attempts;
        let retry = self.settings.initial_state_retry;

        let sender = tokio::spawn(async move {
            for attempt in 1..=attempts {
                let Some(tx) = mailbox.upgrade() else { return false };
                let snapshot = state.playback.lock().await.clone();
                match tx.send_timeout(snapshot, retry).await {
                    Ok(()) => {
                        debug!(session = %id, attempt, "initial playback state sent");
                        return true;
                    }
                    Err(SendTimeoutError::Timeout(_)) => {
                        debug!(session = %id, attempt, "mailbox busy, retrying initial state");
                    }
                    Err(SendTimeoutError::Closed(_)) => return false,
                }
            }
            false
        });

        tokio::spawn(async move {
            match sender.await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(session = %id, user = %name, attempts, "initial state not delivered, evicting");
                    let _ = control.send(Control::Unregister(id));
                }
                Err(e) => {
                    warn!(session = %id, user = %name, error = %e, "initial state sender failed, evicting");
                    let _ = control.send(Control::Unregister(id));
                }
            }
        });
    }
}
