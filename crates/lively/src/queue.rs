// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Broadcast queue of pending reload patterns.
//!
//! Every pushed pattern gets a sequence number. A client holds a [`Cursor`]
//! (the next sequence it has not seen) and asks for everything from there on,
//! so clients progress independently and nothing is consumed out from under
//! anyone else.
//!
//! # Retention
//!
//! History is trimmed when any of these hold:
//!
//! - the entry is older than [`RetentionPolicy::max_age`]
//! - more than [`RetentionPolicy::capacity`] entries are held
//! - every client seen within [`RetentionPolicy::client_ttl`] has a cursor
//!   past the entry, and no anonymous poller was seen in that window
//!
//! Cursors handed out by [`ReloadQueue::pin_current`] for served pages count
//! as clients for `client_ttl`, covering the gap before a tab's first poll.
//!
//! A client whose cursor predates the oldest retained entry gets everything
//! still retained.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::pattern::ReloadPattern;

/// Position in the queue: the next sequence number a client has not seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(u64);

impl Cursor {
    /// Position before the first pattern ever pushed.
    pub const START: Cursor = Cursor(0);

    /// Raw sequence number.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Cursor {
    fn from(v: u64) -> Self {
        Cursor(v)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cursor {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Cursor)
    }
}

/// Patterns delivered to one client, plus where to poll from next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// New patterns in push order, without duplicates.
    pub patterns: Vec<ReloadPattern>,
    /// Cursor for the next poll.
    pub cursor: Cursor,
}

impl Batch {
    /// A batch with no patterns that leaves the client where it was.
    pub fn empty(cursor: Cursor) -> Self {
        Self {
            patterns: Vec::new(),
            cursor,
        }
    }

    /// True when there is nothing to act on.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Bounds on how much history the queue keeps.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Entries older than this are always dropped.
    pub max_age: Duration,
    /// Hard cap on retained entries.
    pub capacity: usize,
    /// A client not seen for this long no longer pins history.
    pub client_ttl: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60),
            capacity: 1024,
            client_ttl: Duration::from_secs(90),
        }
    }
}

struct Entry {
    seq: u64,
    at: Instant,
    pattern: ReloadPattern,
}

struct ClientMark {
    cursor: u64,
    seen: Instant,
}

#[derive(Default)]
struct State {
    entries: VecDeque<Entry>,
    next: u64,
    clients: HashMap<String, ClientMark>,
    anonymous_seen: Option<Instant>,
    /// Cursors embedded in served pages whose first poll may not have
    /// arrived yet.
    served: BTreeMap<u64, Instant>,
}

/// Multi-producer, multi-consumer broadcast queue of reload patterns.
pub struct ReloadQueue {
    state: Mutex<State>,
    head: watch::Sender<u64>,
    policy: RetentionPolicy,
}

impl Default for ReloadQueue {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl ReloadQueue {
    /// Creates an empty queue.
    pub fn new(policy: RetentionPolicy) -> Self {
        let (head, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            head,
            policy,
        }
    }

    /// Appends one pattern and wakes every waiting client.
    pub fn push(&self, pattern: ReloadPattern) -> Cursor {
        self.extend(std::iter::once(pattern))
    }

    /// Appends patterns as one contiguous run.
    pub fn extend<I>(&self, patterns: I) -> Cursor
    where
        I: IntoIterator<Item = ReloadPattern>,
    {
        let next = {
            let mut state = self.lock();
            let now = Instant::now();
            for pattern in patterns {
                let seq = state.next;
                state.next += 1;
                state.entries.push_back(Entry {
                    seq,
                    at: now,
                    pattern,
                });
            }
            self.trim(&mut state, now);
            state.next
        };
        self.head.send_replace(next);
        Cursor(next)
    }

    /// Cursor pointing just past the newest pattern ("from now on").
    pub fn current(&self) -> Cursor {
        Cursor(self.lock().next)
    }

    /// Current cursor, held as history for a page about to be served.
    ///
    /// The pin keeps entries from that cursor on until `client_ttl` passes,
    /// so a tab that loads between two saves still sees the second one even
    /// when every tracked client has moved past it.
    pub fn pin_current(&self) -> Cursor {
        let mut state = self.lock();
        let cursor = state.next;
        state.served.insert(cursor, Instant::now());
        Cursor(cursor)
    }

    /// Returns patterns after `cursor` without waiting, or `None` if there
    /// are none yet.
    pub fn try_batch(&self, cursor: Cursor) -> Option<Batch> {
        let state = self.lock();
        let from = Self::clamp(&state, cursor);
        if state.next <= from {
            return None;
        }

        let mut seen = HashSet::new();
        let patterns = state
            .entries
            .iter()
            .filter(|e| e.seq >= from)
            .filter(|e| seen.insert(e.pattern.as_str()))
            .map(|e| e.pattern.clone())
            .collect();

        Some(Batch {
            patterns,
            cursor: Cursor(state.next),
        })
    }

    /// Waits until something is pushed after `cursor`, then returns it.
    ///
    /// `None` starts from now. Dropping the future releases the wait without
    /// touching queue state.
    pub async fn next_batch(&self, cursor: Option<Cursor>) -> Batch {
        let from = self.start(cursor);
        self.wait_from(from).await
    }

    /// Like [`next_batch`](Self::next_batch) but gives up after `timeout`,
    /// returning an empty batch that keeps the client's position.
    pub async fn wait_batch(&self, cursor: Option<Cursor>, timeout: Duration) -> Batch {
        let from = self.start(cursor);
        tokio::time::timeout(timeout, self.wait_from(from))
            .await
            .unwrap_or_else(|_| Batch::empty(from))
    }

    /// Records that `client` has seen everything before `cursor`.
    ///
    /// `None` marks an anonymous poll, which disables cursor-based trimming
    /// until it ages out.
    pub fn touch(&self, client: Option<&str>, cursor: Cursor) {
        let mut state = self.lock();
        let now = Instant::now();
        match client {
            Some(id) => {
                state.clients.insert(
                    id.to_string(),
                    ClientMark {
                        cursor: cursor.0,
                        seen: now,
                    },
                );
            }
            None => state.anonymous_seen = Some(now),
        }
        self.trim(&mut state, now);
    }

    /// Stops tracking `client`.
    pub fn forget(&self, client: &str) {
        let mut state = self.lock();
        state.clients.remove(client);
        self.trim(&mut state, Instant::now());
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when no history is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of clients currently pinning history.
    pub fn tracked_clients(&self) -> usize {
        self.lock().clients.len()
    }

    fn start(&self, cursor: Option<Cursor>) -> Cursor {
        let state = self.lock();
        match cursor {
            Some(c) => Cursor(Self::clamp(&state, c)),
            None => Cursor(state.next),
        }
    }

    async fn wait_from(&self, from: Cursor) -> Batch {
        // Subscribe before checking so a push in between is not missed.
        let mut head = self.head.subscribe();
        loop {
            if let Some(batch) = self.try_batch(from) {
                return batch;
            }
            if head.wait_for(|next| *next > from.0).await.is_err() {
                // Unreachable while `self` holds the sender.
                return Batch::empty(from);
            }
        }
    }

    /// A cursor from before a restart can point past the head; treat it as "now".
    fn clamp(state: &State, cursor: Cursor) -> u64 {
        if cursor.0 > state.next {
            state.next
        } else {
            cursor.0
        }
    }

    fn trim(&self, state: &mut State, now: Instant) {
        let policy = &self.policy;

        state
            .clients
            .retain(|_, mark| now.duration_since(mark.seen) <= policy.client_ttl);
        if state
            .anonymous_seen
            .is_some_and(|seen| now.duration_since(seen) > policy.client_ttl)
        {
            state.anonymous_seen = None;
        }

        state
            .served
            .retain(|_, at| now.duration_since(*at) <= policy.client_ttl);

        let pinned_from = if state.anonymous_seen.is_some() {
            None
        } else {
            state
                .clients
                .values()
                .map(|m| m.cursor)
                .chain(state.served.keys().copied())
                .min()
        };

        while let Some(front) = state.entries.front() {
            let expired = now.duration_since(front.at) > policy.max_age;
            let over_capacity = state.entries.len() > policy.capacity;
            let consumed = pinned_from.is_some_and(|min| front.seq < min);
            if expired || over_capacity || consumed {
                state.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn strings(batch: &Batch) -> Vec<&str> {
        batch.patterns.iter().map(|p| p.as_str()).collect()
    }

    #[tokio::test]
    async fn test_push_then_poll_from_start() {
        let queue = ReloadQueue::default();
        queue.push(ReloadPattern::page("/"));

        let batch = queue.next_batch(Some(Cursor::START)).await;
        assert_eq!(strings(&batch), vec!["/"]);
        assert_eq!(batch.cursor, Cursor::from(1));
        assert!(queue.try_batch(batch.cursor).is_none());
    }

    #[tokio::test]
    async fn test_fresh_client_starts_from_now() {
        let queue = Arc::new(ReloadQueue::default());
        queue.push(ReloadPattern::page("/old/"));

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next_batch(None).await })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(ReloadPattern::page("/new/"));

        let batch = waiter.await.unwrap();
        assert_eq!(strings(&batch), vec!["/new/"]);
    }

    #[tokio::test]
    async fn test_broadcast_to_independent_clients() {
        let queue = ReloadQueue::default();
        let a = queue.current();
        queue.push(ReloadPattern::page("/one/"));
        let b = queue.current();
        queue.push(ReloadPattern::page("/two/"));

        let batch_a = queue.next_batch(Some(a)).await;
        let batch_b = queue.next_batch(Some(b)).await;
        assert_eq!(strings(&batch_a), vec!["/one/", "/two/"]);
        assert_eq!(strings(&batch_b), vec!["/two/"]);
        assert_eq!(batch_a.cursor, batch_b.cursor);

        // A's consumption left B's view intact and vice versa.
        assert_eq!(strings(&queue.next_batch(Some(b)).await), vec!["/two/"]);
    }

    #[tokio::test]
    async fn test_duplicates_collapse_within_batch() {
        let queue = ReloadQueue::default();
        queue.extend(["/", "patch:/a.css", "/", "patch:/a.css"].map(ReloadPattern::from));
        let batch = queue.next_batch(Some(Cursor::START)).await;
        assert_eq!(strings(&batch), vec!["/", "patch:/a.css"]);
        assert_eq!(batch.cursor, Cursor::from(4));
    }

    #[tokio::test]
    async fn test_timeout_keeps_position() {
        let queue = ReloadQueue::default();
        queue.push(ReloadPattern::page("/"));
        let cursor = queue.current();

        let batch = queue.wait_batch(Some(cursor), Duration::from_millis(20)).await;
        assert!(batch.is_empty());
        assert_eq!(batch.cursor, cursor);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_state_alone() {
        let queue = Arc::new(ReloadQueue::default());
        let cursor = queue.current();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next_batch(Some(cursor)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        let _ = waiter.await;

        queue.push(ReloadPattern::page("/after/"));
        let batch = queue.next_batch(Some(cursor)).await;
        assert_eq!(strings(&batch), vec!["/after/"]);
    }

    #[tokio::test]
    async fn test_stale_cursor_from_previous_run_resets() {
        let queue = ReloadQueue::default();
        queue.push(ReloadPattern::page("/"));

        let batch = queue
            .wait_batch(Some(Cursor::from(500)), Duration::from_millis(10))
            .await;
        assert!(batch.is_empty());
        assert_eq!(batch.cursor, Cursor::from(1));
    }

    #[test]
    fn test_trim_after_all_clients_advance() {
        let queue = ReloadQueue::default();
        queue.touch(Some("a"), queue.current());
        queue.touch(Some("b"), queue.current());
        queue.extend(["/1/", "/2/"].map(ReloadPattern::from));
        assert_eq!(queue.len(), 2);

        queue.touch(Some("a"), Cursor::from(2));
        assert_eq!(queue.len(), 2, "b has not advanced yet");

        queue.touch(Some("b"), Cursor::from(1));
        assert_eq!(queue.len(), 1);
        queue.touch(Some("b"), Cursor::from(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_anonymous_poller_blocks_cursor_trim() {
        let queue = ReloadQueue::default();
        queue.touch(None, queue.current());
        queue.touch(Some("a"), queue.current());
        queue.push(ReloadPattern::page("/"));
        queue.touch(Some("a"), Cursor::from(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_served_page_keeps_history_until_first_poll() {
        let queue = ReloadQueue::default();
        queue.touch(Some("open-tab"), queue.current());

        let served = queue.pin_current();
        queue.push(ReloadPattern::page("/"));
        queue.touch(Some("open-tab"), Cursor::from(1));
        assert_eq!(queue.len(), 1);

        let batch = queue.try_batch(served).unwrap();
        assert_eq!(strings(&batch), vec!["/"]);
        assert_eq!(batch.cursor, Cursor::from(1));
    }

    #[test]
    fn test_served_pin_expires_with_client_ttl() {
        let queue = ReloadQueue::new(RetentionPolicy {
            max_age: Duration::from_secs(60),
            capacity: 16,
            client_ttl: Duration::from_millis(20),
        });
        queue.pin_current();
        queue.touch(Some("a"), queue.current());
        queue.push(ReloadPattern::page("/"));

        std::thread::sleep(Duration::from_millis(40));
        queue.touch(Some("a"), Cursor::from(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_and_age_caps() {
        let queue = ReloadQueue::new(RetentionPolicy {
            max_age: Duration::from_millis(30),
            capacity: 2,
            client_ttl: Duration::from_secs(60),
        });
        queue.extend(["/1/", "/2/", "/3/"].map(ReloadPattern::from));
        assert_eq!(queue.len(), 2);

        std::thread::sleep(Duration::from_millis(60));
        queue.push(ReloadPattern::page("/4/"));
        assert_eq!(queue.len(), 1);

        // A client behind the retained window gets what is left.
        let batch = queue.try_batch(Cursor::START).unwrap();
        assert_eq!(strings(&batch), vec!["/4/"]);
    }

    #[test]
    fn test_forget_releases_history() {
        let queue = ReloadQueue::default();
        queue.touch(Some("slow"), queue.current());
        queue.touch(Some("fast"), queue.current());
        queue.push(ReloadPattern::page("/"));
        queue.touch(Some("fast"), Cursor::from(1));
        assert_eq!(queue.len(), 1);

        queue.forget("slow");
        assert!(queue.is_empty());
        assert_eq!(queue.tracked_clients(), 1);
    }
}
