// Per-topic membership registry and delivery sequence counter.
use crate::message::OutboundMessage;
use crate::session::SessionId;
use arc_swap::ArcSwap;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

pub(crate) type Mailbox = mpsc::Sender<Arc<OutboundMessage>>;

#[derive(Debug, Clone)]
pub(crate) struct RoomMember {
    pub(crate) session_id: SessionId,
    pub(crate) mailbox: Mailbox,
}

/// Sessions currently subscribed to one topic.
///
/// Dispatch reads an immutable snapshot of the members; joins and leaves take the
/// inner mutex and publish a fresh snapshot, so a broadcast never waits on a
/// subscription change.
#[derive(Debug)]
pub struct Room {
    topic: String,
    // Snapshot used by the dispatch path: lock-free read, rebuilt on membership change.
    snapshot: ArcSwap<Vec<RoomMember>>,
    // Authoritative membership, only touched by subscribe/unsubscribe/teardown.
    members: Mutex<HashMap<SessionId, Mailbox>>,
    // Last delivery sequence handed out; 0 until the first delivered broadcast.
    seq: AtomicU64,
}

impl Room {
    pub(crate) fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            snapshot: ArcSwap::from_pointee(Vec::new()),
            members: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Most recent delivery sequence assigned in this room.
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    pub fn member_count(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.members.lock().contains_key(session_id)
    }

    /// Adds the session; returns `false` when it was already a member.
    pub(crate) fn join(&self, session_id: SessionId, mailbox: Mailbox) -> bool {
        let mut members = self.members.lock();
        if members.contains_key(&session_id) {
            return false;
        }
        members.insert(session_id, mailbox);
        self.rebuild_snapshot(&members);
        true
    }

    /// Removes the session; returns `false` when it was not a member.
    pub(crate) fn leave(&self, session_id: &SessionId) -> bool {
        let mut members = self.members.lock();
        if members.remove(session_id).is_none() {
            return false;
        }
        self.rebuild_snapshot(&members);
        true
    }

    /// Drops members whose mailbox was found closed during fan-out.
    ///
    /// A member is only removed while the room still holds that exact channel; a session
    /// that re-registered under the same ID since the snapshot keeps its new membership.
    pub(crate) fn prune_closed(&self, stale: &[RoomMember]) {
        let mut members = self.members.lock();
        let mut removed = false;
        for member in stale {
            let same = members
                .get(&member.session_id)
                .is_some_and(|current| current.same_channel(&member.mailbox));
            if same {
                members.remove(&member.session_id);
                removed = true;
            }
        }
        if removed {
            self.rebuild_snapshot(&members);
        }
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Arc<Vec<RoomMember>> {
        self.snapshot.load_full()
    }

    /// Claims the next delivery sequence number.
    pub(crate) fn advance(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn rebuild_snapshot(&self, members: &HashMap<SessionId, Mailbox>) {
        let snapshot = members
            .iter()
            .map(|(session_id, mailbox)| RoomMember {
                session_id: *session_id,
                mailbox: mailbox.clone(),
            })
            .collect::<Vec<_>>();
        self.snapshot.store(Arc::new(snapshot));
    }
}
