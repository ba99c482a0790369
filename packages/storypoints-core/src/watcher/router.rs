/// Mutation router.
///
/// Classifies observer batches into host churn, badge-only changes and real
/// structural changes, and picks out the narrower signals the pipeline reacts
/// to on its own: list header edits, card hydration and card removal.
///
/// A record is the pipeline's own doing when it lands inside an origin-tagged
/// node, when it only adds or removes origin-tagged nodes, or when it reports
/// text the pipeline registered a fingerprint for before writing it.
use std::time::Instant;

use super::self_write::TitleEchoTracker;
use super::types::{MutationClass, RoutedBatch};
use crate::dom::{Document, MutationKind, MutationRecord, Role};
use crate::types::{NodeId, PointKind};

/// Host nodes the host rewrites constantly without affecting any estimate.
const HOST_CHURN: &[Role] = &[
    Role::ListHeader,
    Role::Timestamp,
    Role::Phrase,
    Role::Member,
    Role::HeaderButton,
    Role::CardBadges,
];

pub struct MutationRouter {
    tracker: TitleEchoTracker,
}

impl Default for MutationRouter {
    fn default() -> Self {
        Self::new(TitleEchoTracker::new())
    }
}

impl MutationRouter {
    pub fn new(tracker: TitleEchoTracker) -> Self {
        Self { tracker }
    }

    /// Remember that `stripped` is about to be written into card title `title`.
    pub fn expect_title_echo(&mut self, title: NodeId, stripped: &str, now: Instant) {
        self.tracker.expect_echo(title, stripped, now);
    }

    pub fn tracker(&self) -> &TitleEchoTracker {
        &self.tracker
    }

    pub fn cleanup(&mut self, now: Instant) {
        self.tracker.expire(now);
    }

    /// Route one batch of records against the page as it is now.
    pub fn route(&mut self, doc: &dyn Document, records: &[MutationRecord]) -> RoutedBatch {
        let mut batch = RoutedBatch::default();
        for record in records {
            let class = self.classify(doc, record);
            batch.class = batch.class.max(Some(class));

            if doc.role(record.target) == Role::ListHeader && !doc.is_extension_owned(record.target) {
                if let Some(list) = doc.list_of(record.target) {
                    push_unique(&mut batch.header_changes, list);
                }
            }
            for added in &record.added {
                if doc.role(*added) == Role::ShortId {
                    if let Some(card) = doc.card_of(*added) {
                        push_unique(&mut batch.hydrated_cards, card);
                    }
                }
            }
            for removed in &record.removed {
                if doc.role(*removed) == Role::Card && !doc.contains(*removed) {
                    push_unique(&mut batch.removed_cards, *removed);
                }
            }
        }
        if let Some(class) = batch.class {
            log::debug!(
                "[storypoints.watcher.router] {} record(s) classified {:?}",
                records.len(),
                class
            );
        }
        batch
    }

    fn classify(&mut self, doc: &dyn Document, record: &MutationRecord) -> MutationClass {
        let estimate_badge = Role::PointBadge(PointKind::Estimate);

        if doc.is_extension_owned(record.target) {
            return if doc.role(record.target) == estimate_badge {
                MutationClass::BadgeOnly
            } else {
                MutationClass::Ignorable
            };
        }

        if record.kind == MutationKind::ChildList {
            let mut touched = record.added.iter().chain(record.removed.iter()).peekable();
            if touched.peek().is_some() && touched.all(|n| doc.is_extension_owned(*n)) {
                let badge_added = record.added.iter().any(|n| doc.role(*n) == estimate_badge);
                return if badge_added {
                    MutationClass::BadgeOnly
                } else {
                    MutationClass::Ignorable
                };
            }
        }

        if HOST_CHURN.contains(&doc.role(record.target)) {
            return MutationClass::Ignorable;
        }

        if record.kind == MutationKind::CharacterData {
            if let Some(text) = doc.text(record.target) {
                if self.tracker.take_echo(record.target, &text) {
                    log::trace!(
                        "[storypoints.watcher.router] Echo of own title write on {}",
                        record.target
                    );
                    return MutationClass::Ignorable;
                }
            }
        }

        MutationClass::Structural
    }
}

fn push_unique(ids: &mut Vec<NodeId>, id: NodeId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}
