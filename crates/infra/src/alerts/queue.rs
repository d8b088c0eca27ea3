use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What `push` does when the queue is at capacity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued alert; producers never block.
    #[default]
    DropOldest,
    /// Block the producer until the consumer frees a slot (or the queue closes).
    ///
    /// An `AlertPipeline` using this policy rejects alerts until it is started.
    Block,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "block" => Ok(OverflowPolicy::Block),
            other => Err(format!("unknown overflow policy '{other}' (expected drop-oldest or block)")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest entry.
    DroppedOldest,
    /// The queue is closed; the value was discarded.
    Closed,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer / single-consumer blocking queue with explicit
/// overflow policy and cooperative close.
///
/// Closing wakes every waiter: blocked producers return `Closed`, a blocked
/// `pop` returns `None`, and `pause` returns early.
#[derive(Debug)]
pub struct AlertQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    closing: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> AlertQueue<T> {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            closing: Condvar::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn push(&self, value: T) -> PushOutcome {
        let mut state = self.lock();
        loop {
            if state.closed {
                return PushOutcome::Closed;
            }

            if state.items.len() < self.capacity {
                state.items.push_back(value);
                self.not_empty.notify_one();
                return PushOutcome::Queued;
            }

            match self.policy {
                OverflowPolicy::DropOldest => {
                    state.items.pop_front();
                    state.items.push_back(value);
                    self.not_empty.notify_one();
                    return PushOutcome::DroppedOldest;
                }
                OverflowPolicy::Block => {
                    state = self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Block until a value is available. Returns `None` once the queue is
    /// closed, even if values remain queued.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(value) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(value);
            }
            state = self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sleep for `interval` unless the queue is closed first.
    /// Returns `true` if the queue is still open afterwards.
    pub fn pause(&self, interval: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .closing
            .wait_timeout_while(state, interval, |s| !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        !state.closed
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        self.closing.notify_all();
    }

    /// Re-open a closed queue. Values still queued are kept.
    pub fn reopen(&self) {
        self.lock().closed = false;
    }
}
