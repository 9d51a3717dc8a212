//! Read side of a session.

use std::time::Duration;

use axum::extract::ws::Message as WsMessage;
use futures_util::{Stream, StreamExt};
use tokio::{sync::oneshot, time::timeout};
use tracing::{debug, info};

use super::dispatch::{dispatch, Flow, SessionCtx};
use crate::{
    error::{AppErr, AppResult},
    message::Message,
};

/// First data frame is the display name; nothing else is accepted before it.
pub async fn read_identity<S>(stream: &mut S, deadline: Duration) -> AppResult<String>
where
    S: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    let read = async {
        while let Some(frame) = stream.next().await {
            match frame? {
                WsMessage::Text(name) => return Ok(name),
                WsMessage::Binary(raw) => return Ok(String::from_utf8_lossy(&raw).into_owned()),
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                WsMessage::Close(_) => return Err(AppErr::Handshake("closed before naming itself".into())),
            }
        }
        Err(AppErr::Handshake("stream ended before naming itself".into()))
    };
    timeout(deadline, read)
        .await
        .map_err(|_| AppErr::Handshake(format!("no name within {deadline:?}")))?
}

/// Decode and dispatch until the stream ends, errors, idles out or the hub
/// hangs up. `Ok` means an orderly end.
pub async fn read_loop<S>(
    ctx: &SessionCtx,
    mut stream: S,
    idle: Duration,
    mut hangup: oneshot::Receiver<()>,
) -> AppResult<()>
where
    S: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = &mut hangup => {
                debug!(session = %ctx.id, "hub closed the session");
                return Ok(());
            }
            next = timeout(idle, stream.next()) => next,
        };

        let raw = match next.map_err(|_| AppErr::IdleTimeout(idle))? {
            None => return Ok(()),
            Some(frame) => match frame? {
                WsMessage::Text(text) => text.into_bytes(),
                WsMessage::Binary(raw) => raw,
                // any pong (or ping) counts as liveness; the timeout restarts next turn
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                WsMessage::Close(frame) => {
                    info!(session = %ctx.id, user = %ctx.name, ?frame, "client closed connection");
                    return Ok(());
                }
            },
        };

        let msg = Message::decode(&raw)?;
        if dispatch(ctx, msg).await == Flow::Stop {
            return Ok(());
        }
    }
}
