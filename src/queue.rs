//! Outbound send throttling
//!
//! FIFO queue that lets at most one message through per throttle window.
//! Time is passed in explicitly; the owner sleeps until [`SendQueue::deadline`]
//! and then calls [`SendQueue::on_deadline`].

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

/// Default minimum spacing between outbound messages
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    /// Nothing sent recently, next message goes straight out
    Idle,
    /// A message went out; nothing else may until `until`
    Open { until: Instant },
}

/// Per-connection outbound queue
#[derive(Debug)]
pub struct SendQueue {
    interval: Duration,
    window: Window,
    pending: VecDeque<String>,
}

impl SendQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: Window::Idle,
            pending: VecDeque::new(),
        }
    }

    /// Enqueue one message.
    ///
    /// Returns the message back if it may be transmitted right now, in which
    /// case a new window is opened. Empty messages are dropped.
    pub fn push(&mut self, data: String, now: Instant) -> Option<String> {
        if data.is_empty() {
            debug!("Failed to send data: no data to send");
            return None;
        }
        match self.window {
            Window::Open { .. } => {
                trace!(queued = self.pending.len() + 1, "Throttle window open, queueing");
                self.pending.push_back(data);
                None
            }
            Window::Idle => {
                self.window = Window::Open {
                    until: now + self.interval,
                };
                Some(data)
            }
        }
    }

    /// Enqueue a batch in order. Returns whatever may go out immediately.
    pub fn push_all<I>(&mut self, batch: I, now: Instant) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut ready = Vec::new();
        for data in batch {
            if let Some(data) = self.push(data, now) {
                ready.push(data);
            }
        }
        ready
    }

    /// When the open window expires, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        match self.window {
            Window::Open { until } => Some(until),
            Window::Idle => None,
        }
    }

    /// Advance past the window deadline.
    ///
    /// Pops the head of the queue and reopens the window, or goes idle when
    /// nothing is pending. Does nothing if the deadline has not passed.
    pub fn on_deadline(&mut self, now: Instant) -> Option<String> {
        let Window::Open { until } = self.window else {
            return None;
        };
        if now < until {
            return None;
        }
        match self.pending.pop_front() {
            Some(data) => {
                self.window = Window::Open {
                    until: now + self.interval,
                };
                Some(data)
            }
            None => {
                self.window = Window::Idle;
                None
            }
        }
    }

    /// Number of messages waiting for a window
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.window == Window::Idle
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE)
    }
}
