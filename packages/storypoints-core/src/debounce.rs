/// Deadline-based debouncing for the single-threaded page loop.
///
/// The debouncer never owns a timer. Callers pass the current instant to
/// `trigger` and `poll`, and the host loop sleeps until `deadline()`. This keeps
/// every decision deterministic and lets tests drive time by hand.
use std::time::{Duration, Instant};

/// Coalescing policy for a burst of triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceMode {
    /// Run on the first trigger, then drop triggers until `delay` of quiet.
    Leading,
    /// Run once, `delay` after the last trigger of a burst, with its arguments.
    Trailing,
}

/// Coalesces triggers carrying arguments of type `A`.
#[derive(Debug)]
pub struct Debouncer<A = ()> {
    delay: Duration,
    mode: DebounceMode,
    deadline: Option<Instant>,
    pending: Option<A>,
}

impl<A> Debouncer<A> {
    pub fn new(delay: Duration, mode: DebounceMode) -> Self {
        Self {
            delay,
            mode,
            deadline: None,
            pending: None,
        }
    }

    pub fn leading(delay: Duration) -> Self {
        Self::new(delay, DebounceMode::Leading)
    }

    pub fn trailing(delay: Duration) -> Self {
        Self::new(delay, DebounceMode::Trailing)
    }

    /// Register a trigger at `now`.
    ///
    /// Returns the arguments to run with immediately (leading mode, outside a
    /// suppression window). A suppressed leading trigger restarts the window.
    /// Trailing triggers always return `None` and replace the pending arguments.
    pub fn trigger(&mut self, now: Instant, args: A) -> Option<A> {
        match self.mode {
            DebounceMode::Leading => {
                let suppressed = self.deadline.is_some_and(|d| now < d);
                self.deadline = Some(now + self.delay);
                if suppressed {
                    None
                } else {
                    Some(args)
                }
            }
            DebounceMode::Trailing => {
                self.pending = Some(args);
                self.deadline = Some(now + self.delay);
                None
            }
        }
    }

    /// Arm the suppression window as if a leading trigger had just run.
    pub fn mark_ran(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Fire an elapsed trailing trigger. Clears an elapsed leading window.
    pub fn poll(&mut self, now: Instant) -> Option<A> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// When the next trailing invocation is due. Leading windows never need waking.
    pub fn deadline(&self) -> Option<Instant> {
        match self.mode {
            DebounceMode::Trailing => self.deadline,
            DebounceMode::Leading => None,
        }
    }

    /// Whether a trailing invocation is waiting or a leading window is open at `now`.
    pub fn is_active(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now < d) || self.pending.is_some()
    }

    /// Drop any pending invocation and close the window.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}

/// A debouncer bound to its action.
pub struct Debounced<A, F>
where
    F: FnMut(A),
{
    inner: Debouncer<A>,
    action: F,
}

impl<A, F> Debounced<A, F>
where
    F: FnMut(A),
{
    pub fn new(action: F, delay: Duration, run_immediately: bool) -> Self {
        let mode = if run_immediately {
            DebounceMode::Leading
        } else {
            DebounceMode::Trailing
        };
        Self {
            inner: Debouncer::new(delay, mode),
            action,
        }
    }

    pub fn trigger(&mut self, now: Instant, args: A) {
        if let Some(args) = self.inner.trigger(now, args) {
            (self.action)(args);
        }
    }

    pub fn poll(&mut self, now: Instant) {
        if let Some(args) = self.inner.poll(now) {
            (self.action)(args);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline()
    }
}
