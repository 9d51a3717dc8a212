//! Write side of a session: mailbox drain, keepalive pings, bounded retries.

use std::fmt::Display;

use axum::extract::ws::Message as WsMessage;
use futures_util::{Sink, SinkExt};
use tokio::{
    sync::oneshot,
    time::{interval_at, sleep, timeout, Instant},
};
use tracing::{debug, warn};

use super::dispatch::SessionCtx;
use crate::{
    config::SessionSettings,
    error::{AppErr, AppResult},
    state::MailboxRx,
};

/// Runs until the mailbox closes, a write gives up, or the reader says stop.
/// Always ends by asking the hub to unregister the session.
pub async fn write_loop<S>(
    ctx: &SessionCtx,
    mut sink: S,
    mut mailbox: MailboxRx,
    mut done: oneshot::Receiver<()>,
    settings: &SessionSettings,
) where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let mut ping = interval_at(Instant::now() + settings.ping_interval, settings.ping_interval);

    loop {
        tokio::select! {
            biased;
            _ = &mut done => {
                debug!(session = %ctx.id, "reader finished, writer exiting");
                break;
            }
            next = mailbox.recv() => {
                let Some(msg) = next else {
                    debug!(session = %ctx.id, "mailbox closed, sending close frame");
                    let _ = timeout(settings.write_timeout, sink.send(WsMessage::Close(None))).await;
                    break;
                };
                let text = match msg.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(session = %ctx.id, error = %e, "dropping unencodable message");
                        continue;
                    }
                };
                if let Err(e) = write_frame(&mut sink, WsMessage::Text(text), settings).await {
                    warn!(session = %ctx.id, user = %ctx.name, error = %e, "write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write_frame(&mut sink, WsMessage::Ping(Vec::new()), settings).await {
                    warn!(session = %ctx.id, user = %ctx.name, error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    ctx.hub.unregister(ctx.id);
}

/// One write under a deadline, retried a fixed number of times.
pub async fn write_frame<S>(sink: &mut S, frame: WsMessage, settings: &SessionSettings) -> AppResult<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let attempts = settings.write_retries + 1;
    let mut reason = String::new();
    for attempt in 1..=attempts {
        match timeout(settings.write_timeout, sink.send(frame.clone())).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => reason = e.to_string(),
            Err(_) => reason = format!("deadline of {:?} exceeded", settings.write_timeout),
        }
        debug!(attempt, %reason, "write attempt failed");
        if attempt < attempts {
            sleep(settings.write_retry_delay).await;
        }
    }
    Err(AppErr::WriteFailed { attempts, reason })
}
