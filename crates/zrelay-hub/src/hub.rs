// Hub handle, builder, session registry and subscription operations.
use crate::decode::{PayloadDecoder, RawDecoder};
use crate::room::{Mailbox, Room};
use crate::session::{ClientSession, SessionGuard, SessionId};
use crate::topic::TopicSet;
use crate::{HubError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Mailbox slots per session unless configured otherwise.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

#[derive(Debug)]
struct SessionEntry {
    // Sender half kept so rooms can be re-joined on later subscribe calls.
    mailbox: Mailbox,
    generation: u64,
    cancel: CancellationToken,
}

pub(crate) struct HubInner {
    pub(crate) topics: TopicSet,
    // Fixed at build time: one room per configured topic.
    pub(crate) rooms: HashMap<String, Arc<Room>, RandomState>,
    sessions: DashMap<SessionId, SessionEntry, RandomState>,
    pub(crate) decoder: Arc<dyn PayloadDecoder>,
    mailbox_capacity: usize,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
}

impl fmt::Debug for HubInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubInner")
            .field("topics", &self.topics)
            .field("sessions", &self.sessions.len())
            .field("mailbox_capacity", &self.mailbox_capacity)
            .finish_non_exhaustive()
    }
}

impl HubInner {
    fn leave_all_rooms(&self, session_id: &SessionId) {
        for room in self.rooms.values() {
            room.leave(session_id);
        }
    }

    /// Removes `session_id` only if it is still the registration identified by `generation`.
    pub(crate) fn remove_generation(&self, session_id: &SessionId, generation: u64) -> bool {
        // The entry guard is held across room cleanup so a concurrent re-open of the
        // same ID cannot subscribe in between and lose its memberships.
        let Entry::Occupied(entry) = self.sessions.entry(*session_id) else {
            return false;
        };
        if entry.get().generation != generation {
            return false;
        }
        self.leave_all_rooms(session_id);
        let (_, removed) = entry.remove_entry();
        removed.cancel.cancel();
        metrics::gauge!("zrelay_sessions").set(self.sessions.len() as f64);
        tracing::debug!(%session_id, "session removed");
        true
    }
}

/// Builder for [`Hub`].
pub struct HubBuilder {
    topics: TopicSet,
    mailbox_capacity: usize,
    decoder: Arc<dyn PayloadDecoder>,
}

impl HubBuilder {
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn PayloadDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn build(self) -> Result<Hub> {
        if self.mailbox_capacity == 0 {
            return Err(HubError::InvalidCapacity);
        }
        let mut rooms = HashMap::with_hasher(RandomState::new());
        for topic in self.topics.iter() {
            rooms.insert(topic.to_string(), Arc::new(Room::new(topic)));
        }
        Ok(Hub {
            inner: Arc::new(HubInner {
                topics: self.topics,
                rooms,
                sessions: DashMap::with_hasher(RandomState::new()),
                decoder: self.decoder,
                mailbox_capacity: self.mailbox_capacity,
                next_generation: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        })
    }
}

/// Shared handle to the rooms and the session registry.
///
/// ```
/// use zrelay_hub::{DispatchOutcome, Hub, TopicSet, UpstreamEvent};
///
/// let hub = Hub::builder(TopicSet::from_entries(["rawtx", "rawblock"]))
///     .build()
///     .expect("hub");
/// let mut session = hub.open(None);
/// hub.subscribe(&session.id(), ["rawtx"]).expect("subscribe");
///
/// let outcome = hub.dispatch(&UpstreamEvent::new("rawtx", vec![0xab], 0));
/// assert_eq!(outcome, DispatchOutcome::Delivered { seq: 1, delivered: 1, dropped: 0 });
/// let message = session.try_next().expect("queued");
/// assert_eq!(message.to_event_stream(), "id: 1\nevent: rawtx\ndata: {\"raw\":\"ab\"}\n\n");
/// ```
#[derive(Debug, Clone)]
pub struct Hub {
    pub(crate) inner: Arc<HubInner>,
}

impl Hub {
    pub fn builder(topics: TopicSet) -> HubBuilder {
        HubBuilder {
            topics,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            decoder: Arc::new(RawDecoder),
        }
    }

    pub fn topics(&self) -> &TopicSet {
        &self.inner.topics
    }

    pub fn room(&self, topic: &str) -> Option<&Arc<Room>> {
        self.inner.rooms.get(topic)
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.inner.mailbox_capacity
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn contains_session(&self, session_id: &SessionId) -> bool {
        self.inner.sessions.contains_key(session_id)
    }

    /// Registers a new session, generating an ID when none is supplied.
    ///
    /// Re-using the ID of a live session evicts it: the older stream is cancelled and its
    /// memberships cleared before the new registration becomes visible.
    pub fn open(&self, requested: Option<SessionId>) -> ClientSession {
        let session_id = requested.unwrap_or_else(SessionId::generate);
        let (sender, receiver) = mpsc::channel(self.inner.mailbox_capacity);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.inner.shutdown.child_token();
        let entry = SessionEntry {
            mailbox: sender,
            generation,
            cancel: cancel.clone(),
        };
        match self.inner.sessions.entry(session_id) {
            Entry::Occupied(mut occupied) => {
                self.inner.leave_all_rooms(&session_id);
                let evicted = occupied.insert(entry);
                evicted.cancel.cancel();
                tracing::info!(%session_id, "evicted previous stream for reused session id");
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
        metrics::gauge!("zrelay_sessions").set(self.inner.sessions.len() as f64);
        tracing::debug!(%session_id, generation, "session opened");
        let guard = SessionGuard::new(Arc::downgrade(&self.inner), session_id, generation);
        ClientSession::new(session_id, receiver, cancel, guard)
    }

    /// Removes a session regardless of which stream registered it.
    ///
    /// Returns `false` when the session was not registered; calling twice is harmless.
    pub fn remove_session(&self, session_id: &SessionId) -> bool {
        let generation = match self.inner.sessions.get(session_id) {
            Some(entry) => entry.generation,
            None => return false,
        };
        self.inner.remove_generation(session_id, generation)
    }

    /// Adds the session to every requested room.
    ///
    /// Unknown topics fail the whole call before any membership changes.
    pub fn subscribe<I, S>(&self, session_id: &SessionId, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = collect_topics(topics);
        self.inner.topics.validate(&requested)?;
        let entry = self
            .inner
            .sessions
            .get(session_id)
            .ok_or(HubError::UnknownSession(*session_id))?;
        for topic in &requested {
            if let Some(room) = self.inner.rooms.get(topic.as_str()) {
                room.join(*session_id, entry.mailbox.clone());
            }
        }
        tracing::debug!(%session_id, topics = ?requested, "subscribed");
        Ok(())
    }

    /// Removes the session from the named rooms and returns the topics it actually left.
    ///
    /// An unknown session is a no-op.
    pub fn unsubscribe<I, S>(&self, session_id: &SessionId, topics: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = collect_topics(topics);
        self.inner.topics.validate(&requested)?;
        let Some(_entry) = self.inner.sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let mut removed = Vec::new();
        for topic in requested {
            let left = self
                .inner
                .rooms
                .get(topic.as_str())
                .is_some_and(|room| room.leave(session_id));
            if left && !removed.contains(&topic) {
                removed.push(topic);
            }
        }
        tracing::debug!(%session_id, topics = ?removed, "unsubscribed");
        Ok(removed)
    }

    /// Makes the session's memberships exactly `topics`, returning the previous set.
    ///
    /// The new list is validated before anything changes; rooms present in both the old
    /// and new set keep the session without a gap.
    pub fn replace_subscriptions<I, S>(
        &self,
        session_id: &SessionId,
        topics: I,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = collect_topics(topics);
        self.inner.topics.validate(&requested)?;
        let entry = self
            .inner
            .sessions
            .get(session_id)
            .ok_or(HubError::UnknownSession(*session_id))?;
        let previous = self.topics_for(session_id);
        for topic in self.inner.topics.iter() {
            let Some(room) = self.inner.rooms.get(topic) else {
                continue;
            };
            if requested.iter().any(|wanted| wanted == topic) {
                room.join(*session_id, entry.mailbox.clone());
            } else {
                room.leave(session_id);
            }
        }
        tracing::debug!(%session_id, from = ?previous, to = ?requested, "subscriptions replaced");
        Ok(previous)
    }

    /// Topics the session is currently a member of, in configured order.
    pub fn topics_for(&self, session_id: &SessionId) -> Vec<String> {
        self.inner
            .topics
            .iter()
            .filter(|topic| {
                self.inner
                    .rooms
                    .get(*topic)
                    .is_some_and(|room| room.contains(session_id))
            })
            .map(str::to_string)
            .collect()
    }

    /// Cancels every session's drain loop and every task holding a shutdown token.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Child token for background tasks that should stop with the hub.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }
}

fn collect_topics<I, S>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    topics
        .into_iter()
        .map(|topic| topic.as_ref().trim().to_string())
        .filter(|topic| !topic.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::UpstreamEvent;

    fn hub() -> Hub {
        Hub::builder(TopicSet::from_entries(["rawtx", "rawblock", "hashblock"]))
            .build()
            .expect("hub")
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Hub::builder(TopicSet::from_entries(["rawtx"]))
            .mailbox_capacity(0)
            .build()
            .expect_err("zero capacity");
        assert_eq!(err, HubError::InvalidCapacity);
    }

    #[test]
    fn rooms_exist_for_every_configured_topic() {
        let hub = hub();
        for topic in ["rawtx", "rawblock", "hashblock"] {
            let room = hub.room(topic).expect("room");
            assert_eq!(room.topic(), topic);
            assert_eq!(room.last_seq(), 0);
        }
        assert!(hub.room("bogus").is_none());
    }

    #[test]
    fn membership_is_net_effect_of_operations() {
        let hub = hub();
        let session = hub.open(None);
        let id = session.id();

        hub.subscribe(&id, ["rawtx"]).expect("subscribe");
        hub.subscribe(&id, ["rawtx", "rawblock"]).expect("subscribe again");
        assert_eq!(hub.topics_for(&id), ["rawtx", "rawblock"]);

        let removed = hub.unsubscribe(&id, ["rawtx", "hashblock"]).expect("unsubscribe");
        assert_eq!(removed, ["rawtx"]);
        assert_eq!(hub.topics_for(&id), ["rawblock"]);

        let previous = hub
            .replace_subscriptions(&id, ["hashblock", "rawtx"])
            .expect("replace");
        assert_eq!(previous, ["rawblock"]);
        assert_eq!(hub.topics_for(&id), ["rawtx", "hashblock"]);
        assert_eq!(hub.room("rawblock").expect("room").member_count(), 0);
    }

    #[test]
    fn invalid_subscribe_leaves_membership_unchanged() {
        let hub = hub();
        let session = hub.open(None);
        let id = session.id();
        hub.subscribe(&id, ["rawblock"]).expect("subscribe");

        let err = hub.subscribe(&id, ["rawtx", "bogus"]).expect_err("bogus");
        assert_eq!(
            err,
            HubError::UnknownTopics {
                invalid: vec!["bogus".to_string()],
                valid: vec![
                    "rawtx".to_string(),
                    "rawblock".to_string(),
                    "hashblock".to_string()
                ],
            }
        );
        assert_eq!(hub.topics_for(&id), ["rawblock"]);
    }

    #[test]
    fn invalid_replace_keeps_existing_subscriptions() {
        let hub = hub();
        let session = hub.open(None);
        let id = session.id();
        hub.subscribe(&id, ["rawtx", "rawblock"]).expect("subscribe");

        assert!(hub.replace_subscriptions(&id, ["bogus"]).is_err());
        assert_eq!(hub.topics_for(&id), ["rawtx", "rawblock"]);
    }

    #[test]
    fn invalid_unsubscribe_removes_nothing() {
        let hub = hub();
        let session = hub.open(None);
        let id = session.id();
        hub.subscribe(&id, ["rawtx"]).expect("subscribe");

        assert!(hub.unsubscribe(&id, ["rawtx", "bogus"]).is_err());
        assert_eq!(hub.topics_for(&id), ["rawtx"]);
    }

    #[test]
    fn subscribe_requires_a_live_session() {
        let hub = hub();
        let stranger = SessionId::generate();
        let err = hub.subscribe(&stranger, ["rawtx"]).expect_err("unknown");
        assert_eq!(err, HubError::UnknownSession(stranger));
        assert_eq!(err.to_string(), format!("'{stranger}' is not a current client"));
        assert!(hub.replace_subscriptions(&stranger, ["rawtx"]).is_err());
        assert_eq!(hub.unsubscribe(&stranger, ["rawtx"]), Ok(Vec::new()));
    }

    #[test]
    fn dropping_session_clears_every_room() {
        let hub = hub();
        let session = hub.open(None);
        let id = session.id();
        hub.subscribe(&id, ["rawtx", "rawblock"]).expect("subscribe");
        assert_eq!(hub.session_count(), 1);

        drop(session);
        assert_eq!(hub.session_count(), 0);
        assert!(hub.topics_for(&id).is_empty());
        assert_eq!(
            hub.dispatch(&UpstreamEvent::new("rawtx", vec![1], 0)),
            crate::DispatchOutcome::NoSubscribers
        );
    }

    #[test]
    fn explicit_removal_is_idempotent() {
        let hub = hub();
        let session = hub.open(None);
        let id = session.id();
        hub.subscribe(&id, ["rawtx"]).expect("subscribe");

        assert!(hub.remove_session(&id));
        assert!(!hub.remove_session(&id));
        assert!(session.is_cancelled());
        assert!(hub.topics_for(&id).is_empty());
        drop(session);
        assert_eq!(hub.session_count(), 0);
    }

    #[test]
    fn reopening_a_live_id_evicts_the_old_stream() {
        let hub = hub();
        let id = SessionId::generate();
        let old = hub.open(Some(id));
        hub.subscribe(&id, ["rawtx"]).expect("subscribe");

        let new = hub.open(Some(id));
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
        assert!(hub.topics_for(&id).is_empty());

        hub.subscribe(&id, ["rawblock"]).expect("subscribe new");
        drop(old);
        assert!(hub.contains_session(&id));
        assert_eq!(hub.topics_for(&id), ["rawblock"]);
    }

    #[test]
    fn shutdown_cancels_sessions_and_background_tokens() {
        let hub = hub();
        let session = hub.open(None);
        let token = hub.shutdown_token();
        hub.shutdown();
        assert!(hub.is_shut_down());
        assert!(session.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn hubs_are_isolated() {
        let first = hub();
        let second = hub();
        let session = first.open(None);
        assert_eq!(first.session_count(), 1);
        assert_eq!(second.session_count(), 0);
        assert!(second.subscribe(&session.id(), ["rawtx"]).is_err());
    }
}
