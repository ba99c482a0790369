/// Per-card point values.
///
/// A card carries one value per point kind, each decoded from the card title.
/// After decoding, the markers are stripped from the rendered title and the
/// value is shown as a badge instead. Both kinds share one title cache: the
/// raw title (markers included) and the stripped title last written back.
/// When the page still shows the stripped title, values are decoded from the
/// cached raw title, so the second kind sees the markers the first one removed.
use std::time::{Duration, Instant};

use crate::codec;
use crate::debounce::Debouncer;
use crate::dom::Document;
use crate::types::{Badge, NodeId, PerKind, PointKind, PointValue};
use crate::watcher::router::MutationRouter;

/// Decoded value of one (card, kind) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardValue {
    /// Marker token as written, `None` when the title has no marker.
    pub token: Option<String>,
}

impl CardValue {
    pub fn points(&self) -> PointValue {
        PointValue::from_token(self.token.as_deref())
    }

    /// Text shown on the badge: the token, blank when absent.
    pub fn display(&self) -> &str {
        self.token.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default)]
struct TitleCache {
    raw: Option<String>,
    stripped: Option<String>,
}

/// What a refresh did to the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardRefresh {
    pub badge_rendered: bool,
    pub title_rewritten: bool,
}

pub struct CardAggregator {
    card: NodeId,
    cache: TitleCache,
    values: PerKind<CardValue>,
    refreshed: PerKind<bool>,
    debounce: PerKind<Debouncer>,
}

impl CardAggregator {
    pub fn new(card: NodeId, delay: Duration) -> Self {
        Self {
            card,
            cache: TitleCache::default(),
            values: PerKind::default(),
            refreshed: PerKind::default(),
            debounce: PerKind::from_fn(|_| Debouncer::leading(delay)),
        }
    }

    pub fn card(&self) -> NodeId {
        self.card
    }

    pub fn value(&self, kind: PointKind) -> &CardValue {
        &self.values[kind]
    }

    pub fn points(&self, kind: PointKind) -> PointValue {
        self.values[kind].points()
    }

    /// Whether `kind` has been decoded at least once.
    pub fn is_initialized(&self, kind: PointKind) -> bool {
        self.refreshed[kind]
    }

    /// Title as last observed with its markers.
    pub fn raw_title(&self) -> Option<&str> {
        self.cache.raw.as_deref()
    }

    /// Debounced refresh. Returns `None` when suppressed.
    pub fn request_refresh(
        &mut self,
        kind: PointKind,
        doc: &mut dyn Document,
        router: &mut MutationRouter,
        now: Instant,
    ) -> Option<CardRefresh> {
        self.debounce[kind].trigger(now, ())?;
        self.refresh(kind, doc, router, now)
    }

    /// Refresh regardless of the debounce window, then open the window.
    pub fn force_refresh(
        &mut self,
        kind: PointKind,
        doc: &mut dyn Document,
        router: &mut MutationRouter,
        now: Instant,
    ) -> Option<CardRefresh> {
        self.debounce[kind].mark_ran(now);
        self.refresh(kind, doc, router, now)
    }

    /// Decode `kind` from the title, render its badge and strip the title.
    ///
    /// Returns `None` when the card has no title yet; the next mutation retries.
    pub fn refresh(
        &mut self,
        kind: PointKind,
        doc: &mut dyn Document,
        router: &mut MutationRouter,
        now: Instant,
    ) -> Option<CardRefresh> {
        let title = doc.card_title(self.card)?;
        let text = doc.text(title).unwrap_or_default();

        let source = if self.cache.stripped.as_deref() != Some(text.as_str()) {
            self.cache.raw = Some(text.clone());
            text.clone()
        } else {
            self.cache.raw.clone().unwrap_or_else(|| text.clone())
        };

        let decoded = codec::decode(&source, kind.marker());
        self.values[kind] = CardValue {
            token: decoded.token,
        };
        self.refreshed[kind] = true;

        let mut outcome = CardRefresh::default();
        let badge = Badge::new(kind, self.values[kind].display());
        if doc.card_badge(self.card, kind).as_ref() != Some(&badge) {
            doc.render_card_badge(self.card, kind, &badge);
            outcome.badge_rendered = true;
        }

        let stripped = codec::strip_markers(&source);
        if stripped != text {
            router.expect_title_echo(title, &stripped, now);
            doc.set_text(title, &stripped);
            outcome.title_rewritten = true;
        }
        self.cache.stripped = Some(stripped);

        log::debug!(
            "[storypoints.card.refresh] {} {:?} = {:?}",
            self.card,
            kind,
            self.values[kind].token
        );
        Some(outcome)
    }
}
