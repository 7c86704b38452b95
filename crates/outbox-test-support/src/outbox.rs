//! In-memory outbox store that emulates lock-skipping claims.
//!
//! Claimed ids are held in a set until the claim completes, is released, or
//! is dropped; other claims skip them. Dropping a claim behaves like a
//! rolled-back transaction.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::clock::Clock;
use outbox_core::entry::{NewOutboxEntry, OutboxEntry};
use outbox_core::error::DomainError;
use outbox_core::store::{ClaimedBatch, CompletionReport, Disposition, OutboxStore};
use uuid::Uuid;

/// A row of the in-memory outbox table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// The entry as it would be claimed.
    pub entry: OutboxEntry,
    /// `None` while pending.
    pub processed_at: Option<DateTime<Utc>>,
    /// Meaningful once `processed_at` is set.
    pub error: bool,
    /// Reason of the latest failed attempt.
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    rows: Vec<StoredEntry>,
    claimed: HashSet<Uuid>,
}

/// An `OutboxStore` backed by a `Vec`, shareable across tasks.
#[derive(Clone)]
pub struct InMemoryOutboxStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
    unavailable: Arc<AtomicBool>,
    failing_commits: Arc<AtomicUsize>,
    claims_opened: Arc<AtomicUsize>,
}

impl InMemoryOutboxStore {
    /// Creates an empty store. `clock` stamps `processed_at`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
            unavailable: Arc::new(AtomicBool::new(false)),
            failing_commits: Arc::new(AtomicUsize::new(0)),
            claims_opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Appends a pending entry, as a committed producer transaction would.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn append(&self, entry: NewOutboxEntry) {
        self.state.lock().unwrap().rows.push(StoredEntry {
            entry: entry.into(),
            processed_at: None,
            error: false,
            last_error: None,
        });
    }

    /// Returns a snapshot of every row, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rows(&self) -> Vec<StoredEntry> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Returns the row for `id`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, id: Uuid) -> Option<StoredEntry> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|row| row.entry.id == id)
            .cloned()
    }

    /// Returns the ids of rows still pending.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|row| row.processed_at.is_none())
            .map(|row| row.entry.id)
            .collect()
    }

    /// Returns how many rows are currently held by open claims.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn claimed_count(&self) -> usize {
        self.state.lock().unwrap().claimed.len()
    }

    /// Returns how many claims have been opened.
    pub fn claims_opened(&self) -> usize {
        self.claims_opened.load(Ordering::SeqCst)
    }

    /// Makes `claim_batch` fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `n` completions fail at commit, rolling back.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl std::fmt::Debug for InMemoryOutboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOutboxStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn claim_batch(&self, limit: usize) -> Result<Box<dyn ClaimedBatch>, DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("connection refused".into()));
        }
        self.claims_opened.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        let mut pending: Vec<OutboxEntry> = state
            .rows
            .iter()
            .filter(|row| row.processed_at.is_none() && !state.claimed.contains(&row.entry.id))
            .map(|row| row.entry.clone())
            .collect();
        pending.sort_by_key(|entry| (entry.created_at, entry.id));
        pending.truncate(limit);

        for entry in &pending {
            state.claimed.insert(entry.id);
        }

        Ok(Box::new(InMemoryClaim {
            store: self.clone(),
            entries: pending,
            settled: false,
        }))
    }
}

/// Dropping an unsettled claim unlocks its rows synchronously. The
/// `PostgreSQL` store only guarantees that for `release` and a failed
/// `complete`, so tests relying on drop belong with the in-memory store.
struct InMemoryClaim {
    store: InMemoryOutboxStore,
    entries: Vec<OutboxEntry>,
    settled: bool,
}

impl InMemoryClaim {
    fn unlock(&mut self, state: &mut State) {
        for entry in &self.entries {
            state.claimed.remove(&entry.id);
        }
        self.settled = true;
    }
}

impl Drop for InMemoryClaim {
    fn drop(&mut self) {
        if !self.settled {
            if let Ok(mut state) = self.store.state.lock() {
                for entry in &self.entries {
                    state.claimed.remove(&entry.id);
                }
            }
        }
    }
}

#[async_trait]
impl ClaimedBatch for InMemoryClaim {
    fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    async fn complete(
        self: Box<Self>,
        disposition: &Disposition,
    ) -> Result<CompletionReport, DomainError> {
        let mut this = self;
        let store = this.store.clone();
        let mut state = store.state.lock().unwrap();

        if store.take_commit_failure() {
            this.unlock(&mut state);
            return Err(DomainError::Infrastructure("commit failed".into()));
        }

        let now = store.clock.now();
        let mut report = CompletionReport::default();
        for claimed in &this.entries {
            let Some(row) = state
                .rows
                .iter_mut()
                .find(|row| row.entry.id == claimed.id && row.processed_at.is_none())
            else {
                continue;
            };
            match disposition {
                Disposition::Delivered => {
                    row.processed_at = Some(now);
                    row.error = false;
                    report.delivered += 1;
                }
                Disposition::Failed {
                    reason,
                    max_attempts,
                } => {
                    row.entry.attempts += 1;
                    row.last_error = Some(reason.clone());
                    if row.entry.attempts >= *max_attempts {
                        row.processed_at = Some(now);
                        row.error = true;
                        report.dead_lettered += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }

        this.unlock(&mut state);
        Ok(report)
    }

    async fn release(self: Box<Self>) -> Result<(), DomainError> {
        let mut this = self;
        let store = this.store.clone();
        let mut state = store.state.lock().unwrap();
        this.unlock(&mut state);
        Ok(())
    }
}
