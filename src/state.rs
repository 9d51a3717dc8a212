use std::{collections::HashMap, fmt, sync::Arc};

use tokio::sync::{
    mpsc::{self, error::TrySendError, WeakSender},
    oneshot, Mutex, RwLock,
};

use crate::message::Message;

/* ------------ session identity ------------ */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self { Self(uuid::Uuid::new_v4()) }
}

impl Default for SessionId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

pub type Mailbox   = mpsc::Sender<Message>;
pub type MailboxRx = mpsc::Receiver<Message>;

/* ------------ hub-side view of a session ------------ */
/// Held only inside the membership set. It owns the sole strong sender of
/// the session's mailbox, so removing it from the set is what closes the
/// mailbox.
#[derive(Debug)]
pub struct SessionHandle {
    pub id:   SessionId,
    pub name: String,
    mailbox:  Mailbox,
    hangup:   oneshot::Sender<()>,
}

impl SessionHandle {
    pub fn new(id: SessionId, name: String, mailbox: Mailbox, hangup: oneshot::Sender<()>) -> Self {
        Self { id, name, mailbox, hangup }
    }

    /// Non-blocking enqueue.
    pub fn try_deliver(&self, msg: Message) -> Result<(), TrySendError<Message>> {
        self.mailbox.try_send(msg)
    }

    pub fn weak_mailbox(&self) -> WeakSender<Message> {
        self.mailbox.downgrade()
    }

    /// Close the mailbox and tell the session's reader to drop the stream.
    pub fn close(self) {
        let Self { mailbox, hangup, .. } = self;
        drop(mailbox);
        let _ = hangup.send(());
    }
}

pub type Members = HashMap<SessionId, SessionHandle>;

/* ------------ state shared by hub and sessions ------------ */
/// Membership is written only by the hub loop; the two other locks are
/// independent of it and of each other.
pub struct SharedState {
    pub members:     RwLock<Members>,
    pub playback:    Mutex<Message>,
    pub watch_hours: Mutex<HashMap<String, f64>>,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            members:     RwLock::new(HashMap::new()),
            playback:    Mutex::new(Message::initial_playback()),
            watch_hours: Mutex::new(HashMap::new()),
        })
    }
}
