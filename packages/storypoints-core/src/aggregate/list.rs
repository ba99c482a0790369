/// Per-list totals and kanban limit.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::card::CardAggregator;
use crate::codec;
use crate::debounce::Debouncer;
use crate::dom::Document;
use crate::types::{format_total, round2, MarkerKind, NodeId, PerKind, PointKind, PointValue};

/// Sums of one list, computed from the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTally {
    /// Per-kind sums over visible cards, rounded to two decimals.
    pub totals: PerKind<f64>,
    /// Estimate occupancy: an unestimated card counts as one.
    pub occupancy: f64,
}

impl ListTally {
    /// Tally the visible, registered cards of `list`.
    ///
    /// Unknown (`?`) values are skipped. Absent values count 0 towards the
    /// totals but 1 towards occupancy.
    pub fn compute(
        doc: &dyn Document,
        list: NodeId,
        cards: &HashMap<NodeId, CardAggregator>,
    ) -> Self {
        let mut totals: PerKind<f64> = PerKind::default();
        let mut occupancy = 0.0;
        for card in doc.cards(list) {
            if !doc.is_visible(card) {
                continue;
            }
            let Some(agg) = cards.get(&card) else {
                continue;
            };
            for kind in PointKind::ALL {
                if let Some(n) = agg.points(kind).sum_contribution() {
                    totals[kind] += n;
                }
            }
            if let Some(n) = agg.points(PointKind::Estimate).occupancy_contribution() {
                occupancy += n;
            }
        }
        Self {
            totals: PerKind::from_fn(|kind| round2(totals[kind])),
            occupancy,
        }
    }

    pub fn overflows(&self, limit: Option<f64>) -> bool {
        limit.is_some_and(|limit| self.occupancy > limit)
    }
}

pub struct ListAggregator {
    list: NodeId,
    kanban_limit: Option<f64>,
    last: Option<ListTally>,
    overflowing: bool,
    refresh: Debouncer,
    recompute: Debouncer,
    /// A header change arrived while `refresh` was suppressed.
    header_stale: bool,
}

impl ListAggregator {
    pub fn new(list: NodeId, refresh_delay: Duration, recompute_delay: Duration) -> Self {
        Self {
            list,
            kanban_limit: None,
            last: None,
            overflowing: false,
            refresh: Debouncer::leading(refresh_delay),
            recompute: Debouncer::leading(recompute_delay),
            header_stale: false,
        }
    }

    pub fn list(&self) -> NodeId {
        self.list
    }

    pub fn kanban_limit(&self) -> Option<f64> {
        self.kanban_limit
    }

    pub fn last_tally(&self) -> Option<&ListTally> {
        self.last.as_ref()
    }

    pub fn is_overflowing(&self) -> bool {
        self.overflowing
    }

    pub fn is_header_stale(&self) -> bool {
        self.header_stale
    }

    /// Debounced header re-parse. Returns whether the kanban limit changed,
    /// `None` when suppressed.
    pub fn request_refresh(&mut self, doc: &dyn Document, now: Instant) -> Option<bool> {
        if self.refresh.trigger(now, ()).is_none() {
            self.header_stale = true;
            return None;
        }
        Some(self.parse_limit(doc))
    }

    /// Re-read the kanban limit from the list header.
    pub fn parse_limit(&mut self, doc: &dyn Document) -> bool {
        self.header_stale = false;
        let Some(header) = doc.list_header(self.list) else {
            return false;
        };
        let title = doc.text(header).unwrap_or_default();
        let limit = match PointValue::from_token(
            codec::extract_token(&title, MarkerKind::KanbanLimit).as_deref(),
        ) {
            PointValue::Number(n) => Some(n),
            _ => None,
        };
        log::debug!(
            "[storypoints.list.refresh] Extracted kanban limit {:?} from {:?}",
            limit,
            title
        );
        let changed = limit != self.kanban_limit;
        self.kanban_limit = limit;
        changed
    }

    /// Open the recompute window. Returns false when the request is suppressed.
    pub fn request_recompute(&mut self, now: Instant) -> bool {
        self.recompute.trigger(now, ()).is_some()
    }

    /// Recompute totals and overflow, writing only what changed.
    pub fn recompute(
        &mut self,
        doc: &mut dyn Document,
        cards: &HashMap<NodeId, CardAggregator>,
    ) -> ListTally {
        let tally = ListTally::compute(&*doc, self.list, cards);
        for kind in PointKind::ALL {
            let text = format_total(tally.totals[kind]);
            if doc.list_total_text(self.list, kind).as_deref() != Some(text.as_str()) {
                doc.render_list_total(self.list, kind, &text);
            }
        }

        let overflowing = tally.overflows(self.kanban_limit);
        if self.kanban_limit.is_some() {
            log::debug!(
                "[storypoints.list.recompute] {} occupancy {} vs limit {:?}",
                self.list,
                tally.occupancy,
                self.kanban_limit
            );
        }
        if overflowing != self.overflowing || self.last.is_none() {
            doc.set_list_overflow(self.list, overflowing);
        }
        self.overflowing = overflowing;
        self.last = Some(tally);
        tally
    }
}
