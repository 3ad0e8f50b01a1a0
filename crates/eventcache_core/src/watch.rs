//! Change notification and live query results.
//!
//! # Responsibility
//! - Fan out per-entity-kind change topics from committed writes to
//!   subscribers.
//! - Keep live read results current by re-running their query when a
//!   relevant topic changes.
//!
//! # Invariants
//! - Topics are published only after the writing transaction committed.
//! - A live result owns its own store handle; refreshing reads, it never
//!   writes.

use crate::db::{StoreContext, StoreHandle};
use crate::model::EntityId;
use crate::repo::RepoResult;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

/// Entity kinds a committed write may have touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Event,
    Tracks,
    Sessions,
    Speakers,
    Sponsors,
    Locations,
    EventDates,
}

/// Fan-out of change topics to any number of subscribers.
///
/// Cloneable and thread-safe; background writers publish, live results on
/// reader threads consume. Subscribers that went away are pruned on the
/// next publish.
#[derive(Debug, Clone, Default)]
pub struct ChangeBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Topic>>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<Topic> {
        let (sender, receiver) = mpsc::channel();
        self.lock().push(sender);
        receiver
    }

    pub fn publish(&self, topic: Topic) {
        self.lock().retain(|sender| sender.send(topic).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<Topic>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// External collaborator notified when a bookmark write committed.
pub trait BookmarkObserver: Send + Sync {
    fn bookmark_changed(&self, session_id: EntityId, bookmarked: bool);
}

/// A read result kept current through change notifications.
///
/// Holds a snapshot plus a subscription; [`LiveResults::refresh`] drains
/// pending notifications and re-runs the query when one of the watched
/// topics changed. The embedded handle confines the value to the thread
/// that opened it.
pub struct LiveResults<T> {
    handle: StoreHandle,
    receiver: mpsc::Receiver<Topic>,
    topics: &'static [Topic],
    query: Box<dyn Fn(&StoreHandle) -> RepoResult<T>>,
    current: T,
}

impl<T> LiveResults<T> {
    /// Subscribes to `topics` and materializes the initial snapshot.
    pub(crate) fn open(
        context: &StoreContext,
        bus: &ChangeBus,
        topics: &'static [Topic],
        query: impl Fn(&StoreHandle) -> RepoResult<T> + 'static,
    ) -> RepoResult<Self> {
        // Subscribe before the first read so a write landing in between
        // shows up as a pending notification instead of being lost.
        let receiver = bus.subscribe();
        let handle = context.open_handle()?;
        let current = query(&handle)?;
        Ok(Self {
            handle,
            receiver,
            topics,
            query: Box::new(query),
            current,
        })
    }

    /// The latest materialized snapshot.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Drains pending notifications; re-runs the query when a watched
    /// topic changed. Returns whether the snapshot was re-materialized.
    pub fn refresh(&mut self) -> RepoResult<bool> {
        let mut relevant = false;
        while let Ok(topic) = self.receiver.try_recv() {
            if self.topics.contains(&topic) {
                relevant = true;
            }
        }
        if relevant {
            self.current = (self.query)(&self.handle)?;
        }
        Ok(relevant)
    }

    /// Blocks until a watched topic changes, then re-materializes.
    ///
    /// Returns `false` when every publisher is gone and no further change
    /// can arrive.
    pub fn wait_for_change(&mut self) -> RepoResult<bool> {
        loop {
            match self.receiver.recv() {
                Ok(topic) if self.topics.contains(&topic) => {
                    // Collapse a burst of pending notifications into one
                    // re-read.
                    while let Ok(_pending) = self.receiver.try_recv() {}
                    self.current = (self.query)(&self.handle)?;
                    return Ok(true);
                }
                Ok(_other) => continue,
                Err(mpsc::RecvError) => return Ok(false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeBus, Topic};

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = ChangeBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(Topic::Tracks);

        assert_eq!(first.try_recv().unwrap(), Topic::Tracks);
        assert_eq!(second.try_recv().unwrap(), Topic::Tracks);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = ChangeBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(Topic::Sessions);
        bus.publish(Topic::Sessions);

        assert_eq!(kept.try_recv().unwrap(), Topic::Sessions);
        assert_eq!(kept.try_recv().unwrap(), Topic::Sessions);
    }
}
