//! One connected client: identity handshake, then a reader on this task and
//! a writer on its own task, joined by the session mailbox.

pub mod dispatch;
pub mod inbound;
pub mod outbound;

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::{
    config::SessionSettings,
    error::AppErr,
    hub::HubHandle,
    state::{SessionHandle, SessionId},
};
use dispatch::SessionCtx;

pub async fn serve(socket: WebSocket, hub: HubHandle, settings: Arc<SessionSettings>) {
    let (sink, mut stream) = socket.split();

    let name = match inbound::read_identity(&mut stream, settings.handshake_timeout).await {
        Ok(name) => name,
        Err(e) => {
            warn!(error = %e, "dropping connection before registration");
            return;
        }
    };

    let id = SessionId::new();
    let (mailbox_tx, mailbox_rx) = mpsc::channel(settings.mailbox_capacity);
    let (hangup_tx, hangup_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let ctx = Arc::new(SessionCtx {
        id,
        name: name.clone(),
        hub: hub.clone(),
        own_mailbox: mailbox_tx.downgrade(),
    });
    if let Err(e) = hub.register(SessionHandle::new(id, name, mailbox_tx, hangup_tx)) {
        warn!(session = %id, error = %e, "could not register session");
        return;
    }
    info!(session = %id, user = %ctx.name, "client connected");

    let writer = {
        let ctx = ctx.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            outbound::write_loop(&ctx, sink, mailbox_rx, done_rx, &settings).await;
        })
    };

    match inbound::read_loop(&ctx, stream, settings.idle_timeout, hangup_rx).await {
        Ok(()) => info!(session = %id, user = %ctx.name, "read side finished"),
        Err(e @ AppErr::IdleTimeout(_)) => warn!(session = %id, user = %ctx.name, error = %e, "idle timeout"),
        Err(e) => warn!(session = %id, user = %ctx.name, error = %e, "read side failed"),
    }

    // single exit point: unregister and stop the writer exactly once
    hub.unregister(id);
    let _ = done_tx.send(());
    let _ = writer.await;
    info!(session = %id, user = %ctx.name, "session closed");
}
