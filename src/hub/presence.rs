//! Roster publishing.
//!
//! Presence delivery is best-effort: a full mailbox is skipped, never evicted.

use tracing::{debug, info};

use crate::{
    message::Message,
    state::{Members, SharedState},
};

/// Sorted display names of everyone registered.
pub fn roster(members: &Members) -> Vec<String> {
    let mut names: Vec<String> = members.values().map(|s| s.name.clone()).collect();
    names.sort();
    names
}

/// Try to enqueue `msg` on every member. Returns how many accepted it.
pub fn deliver_best_effort(members: &Members, msg: &Message) -> usize {
    members
        .values()
        .filter(|s| match s.try_deliver(msg.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!(session = %s.id, user = %s.name, kind = ?msg.kind, error = %e, "skipping recipient");
                false
            }
        })
        .count()
}

/// Push the roster to everyone, then a zero watch-hours seed per user.
/// Real counters follow when each client reports its own value.
pub async fn publish(state: &SharedState) {
    let members = state.members.read().await;
    let names = roster(&members);
    info!(users = ?names, "publishing presence");

    deliver_best_effort(&members, &Message::presence(names.clone()));
    for name in &names {
        deliver_best_effort(&members, &Message::watch_hours(name, 0.0));
    }
}
