//! What a session does with each decoded inbound message.

use tokio::sync::mpsc::WeakSender;
use tracing::{debug, warn};

use crate::{
    hub::{presence, HubHandle},
    message::{Message, MessageKind},
    state::SessionId,
};

/// Everything the read side needs to act on behalf of one client.
pub struct SessionCtx {
    pub id:   SessionId,
    pub name: String,
    pub hub:  HubHandle,
    /// Weak so it never keeps the mailbox open after the hub drops the session.
    pub own_mailbox: WeakSender<Message>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub async fn dispatch(ctx: &SessionCtx, mut msg: Message) -> Flow {
    msg.sender = Some(ctx.name.clone());
    debug!(session = %ctx.id, user = %ctx.name, kind = ?msg.kind, "received");

    match msg.kind {
        MessageKind::Video => {
            msg.normalize_playback();
            let mut playback = ctx.hub.state().playback.lock().await;
            debug!(
                url = ?msg.video_url, state = ?msg.playback_state, time = ?msg.current_time,
                "playback state replaced"
            );
            *playback = msg;
            Flow::Continue
        }
        MessageKind::Sync => sync(ctx).await,
        MessageKind::WatchHours => {
            watch_hours(ctx, msg).await;
            Flow::Continue
        }
        MessageKind::Presence => {
            warn!(session = %ctx.id, user = %ctx.name, "client-sent presence dropped");
            Flow::Continue
        }
        MessageKind::Message | MessageKind::Other(_) => match ctx.hub.broadcast(msg).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                warn!(session = %ctx.id, error = %e, "broadcast intake unavailable");
                Flow::Stop
            }
        },
    }
}

/// Reply to the requester only. A mailbox that cannot take the reply ends
/// the session.
async fn sync(ctx: &SessionCtx) -> Flow {
    let snapshot = ctx.hub.state().playback.lock().await.clone();
    let delivered = match ctx.own_mailbox.upgrade() {
        Some(tx) => tx.try_send(snapshot).map_err(|e| e.to_string()),
        None => Err("mailbox closed".to_string()),
    };
    match delivered {
        Ok(()) => {
            debug!(session = %ctx.id, user = %ctx.name, "sync answered");
            Flow::Continue
        }
        Err(reason) => {
            warn!(session = %ctx.id, user = %ctx.name, %reason, "cannot answer sync, unregistering");
            ctx.hub.unregister(ctx.id);
            Flow::Stop
        }
    }
}

/// Record the sender's own counter, then hand the update straight to every
/// member. Bypasses the broadcast intake so nobody sees it twice.
async fn watch_hours(ctx: &SessionCtx, mut msg: Message) {
    let hours = msg.watch_hours.unwrap_or(0.0);
    msg.watch_hours = Some(hours);
    ctx.hub.state().watch_hours.lock().await.insert(ctx.name.clone(), hours);

    let members = ctx.hub.state().members.read().await;
    let reached = presence::deliver_best_effort(&members, &msg);
    debug!(user = %ctx.name, hours, reached, "watch hours relayed");
}
