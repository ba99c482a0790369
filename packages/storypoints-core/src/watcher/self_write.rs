/// Echo tracking for stripped card titles.
///
/// Decoding a card strips its markers and writes the bare title back into
/// the host's title node. The observer then reports that node as changed,
/// exactly like a user edit would. Before each write-back the pipeline
/// records a fingerprint of the stripped title; a later title record whose
/// text hashes to a waiting fingerprint is our own echo and is consumed.
/// Any other text on the node is a host edit.
///
/// Several kinds can rewrite the same title before the observer fires, so a
/// node may wait on more than one echo. Echoes that never arrive (the host
/// re-rendered the card first) are dropped after `ECHO_TTL`.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::TitleFingerprint;
use crate::types::NodeId;

pub const ECHO_TTL: Duration = Duration::from_secs(10);

struct AwaitedEcho {
    fingerprint: TitleFingerprint,
    written_at: Instant,
}

/// Stripped titles written into host title nodes, awaiting their echo.
pub struct TitleEchoTracker {
    awaiting: HashMap<NodeId, Vec<AwaitedEcho>>,
    ttl: Duration,
}

impl Default for TitleEchoTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TitleEchoTracker {
    pub fn new() -> Self {
        Self::with_ttl(ECHO_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            awaiting: HashMap::new(),
            ttl,
        }
    }

    /// Call right before writing `stripped` into `title`.
    pub fn expect_echo(&mut self, title: NodeId, stripped: &str, now: Instant) {
        self.awaiting.entry(title).or_default().push(AwaitedEcho {
            fingerprint: TitleFingerprint::of(stripped),
            written_at: now,
        });
    }

    /// Whether `observed` on `title` is the echo of one of our writes.
    /// A match is consumed, so replaying the same record twice only
    /// matches once.
    pub fn take_echo(&mut self, title: NodeId, observed: &str) -> bool {
        let Some(echoes) = self.awaiting.get_mut(&title) else {
            return false;
        };
        let fingerprint = TitleFingerprint::of(observed);
        let Some(pos) = echoes.iter().position(|e| e.fingerprint == fingerprint) else {
            return false;
        };
        echoes.remove(pos);
        if echoes.is_empty() {
            self.awaiting.remove(&title);
        }
        true
    }

    /// Drop echoes older than the TTL.
    pub fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.awaiting.retain(|title, echoes| {
            let before = echoes.len();
            echoes.retain(|e| now.duration_since(e.written_at) < ttl);
            if echoes.len() != before {
                log::debug!(
                    "[storypoints.watcher.echo] Title {} never echoed {} write(s)",
                    title,
                    before - echoes.len()
                );
            }
            !echoes.is_empty()
        });
    }

    pub fn is_awaiting(&self, title: NodeId) -> bool {
        self.awaiting.contains_key(&title)
    }

    pub fn awaiting_count(&self) -> usize {
        self.awaiting.values().map(Vec::len).sum()
    }
}
