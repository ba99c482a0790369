/// Recompute pipeline.
///
/// Owns the registry of card and list aggregators (keyed by node), the
/// mutation router and every debouncer, and turns observer batches and timer
/// ticks into card refreshes, list recomputes and board recomputes.
///
/// Work that the page would defer to the next tick runs through a task queue
/// drained at the end of every entry point. Queuing a task that is already
/// queued moves it to the back, so a list recomputes once after all of its
/// cards refreshed, and the board once after all lists.
///
/// List recomputes are immediate-then-suppress. A request that falls inside
/// the suppression window marks the list stale and arms a trailing catch-up,
/// which re-requests every stale list once the window has passed. Totals are
/// therefore never left behind the cards they sum.
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Instant;

use serde::Serialize;

use crate::aggregate::{BoardAggregator, CardAggregator, ListAggregator};
use crate::config::{PipelineConfig, Settings};
use crate::debounce::Debouncer;
use crate::direction;
use crate::dom::{Document, MutationRecord};
use crate::picker;
use crate::types::{NodeId, PointKind};
use crate::watcher::router::MutationRouter;
use crate::watcher::self_write::TitleEchoTracker;
use crate::watcher::types::{MutationClass, RoutedBatch};

/// Upper bound on observer rounds in `settle`.
const MAX_SETTLE_ROUNDS: usize = 64;
/// Upper bound on queued tasks run by one entry point.
const MAX_TASKS: usize = 100_000;
/// Upper bound on timer steps in `run_until_idle`.
const MAX_TIMER_STEPS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    RescanAll,
    ComputeAllLists,
    ComputeList(NodeId),
    ComputeBoard,
}

/// Counters for tests and the CLI's verbose output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub batches: u64,
    pub ignored_batches: u64,
    pub full_rescans: u64,
    pub card_refreshes: u64,
    pub title_rewrites: u64,
    pub list_recomputes: u64,
    pub coalesced_recomputes: u64,
    pub board_recomputes: u64,
    pub direction_passes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Page did not settle after {rounds} rounds")]
    Livelock { rounds: usize },
}

pub struct Pipeline {
    config: PipelineConfig,
    settings: Settings,
    router: MutationRouter,
    lists: HashMap<NodeId, ListAggregator>,
    cards: HashMap<NodeId, CardAggregator>,
    board: BoardAggregator,
    full_rescan: Debouncer,
    catch_up: Debouncer,
    directions: Debouncer,
    stale: BTreeSet<NodeId>,
    tasks: VecDeque<Task>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, settings: Settings) -> Self {
        Self {
            router: MutationRouter::new(TitleEchoTracker::with_ttl(config.fingerprint_ttl)),
            lists: HashMap::new(),
            cards: HashMap::new(),
            board: BoardAggregator::new(),
            full_rescan: Debouncer::trailing(config.rescan_delay),
            catch_up: Debouncer::trailing(config.list_delay),
            directions: Debouncer::trailing(config.direction_delay),
            stale: BTreeSet::new(),
            tasks: VecDeque::new(),
            stats: PipelineStats::default(),
            config,
            settings,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn router(&self) -> &MutationRouter {
        &self.router
    }

    pub fn list(&self, list: NodeId) -> Option<&ListAggregator> {
        self.lists.get(&list)
    }

    pub fn card(&self, card: NodeId) -> Option<&CardAggregator> {
        self.cards.get(&card)
    }

    pub fn board(&self) -> &BoardAggregator {
        &self.board
    }

    pub fn registered_lists(&self) -> usize {
        self.lists.len()
    }

    pub fn registered_cards(&self) -> usize {
        self.cards.len()
    }

    /// Lists waiting for a suppressed recompute.
    pub fn stale_lists(&self) -> Vec<NodeId> {
        self.stale.iter().copied().collect()
    }

    // -- entry points ----------------------------------------------------------

    /// Register every list and card on the page and render all totals.
    pub fn start(&mut self, doc: &mut dyn Document, now: Instant) {
        log::info!(
            "[storypoints.pipeline] Starting on {} list(s)",
            doc.lists().len()
        );
        self.enqueue(Task::RescanAll);
        self.directions.trigger(now, ());
        picker::ensure_pickers(doc, &self.settings);
        self.run_tasks(doc, now);
    }

    /// Route one observer batch and run whatever it calls for.
    pub fn handle_mutations(
        &mut self,
        doc: &mut dyn Document,
        records: &[MutationRecord],
        now: Instant,
    ) -> RoutedBatch {
        self.stats.batches += 1;
        let routed = self.router.route(&*doc, records);

        for card in &routed.removed_cards {
            self.cards.remove(card);
        }
        match routed.class {
            Some(MutationClass::Structural) => {
                self.full_rescan.trigger(now, ());
            }
            Some(MutationClass::BadgeOnly) => self.enqueue(Task::ComputeAllLists),
            _ => {
                if routed.is_quiet() {
                    self.stats.ignored_batches += 1;
                }
            }
        }
        for list in &routed.header_changes {
            self.refresh_header(doc, *list, now);
        }
        for card in &routed.hydrated_cards {
            self.hydrate(doc, *card, now);
        }

        self.directions.trigger(now, ());
        picker::ensure_pickers(doc, &self.settings);
        self.run_tasks(doc, now);
        routed
    }

    /// Fire elapsed timers.
    pub fn advance(&mut self, doc: &mut dyn Document, now: Instant) {
        if self.full_rescan.poll(now).is_some() {
            self.enqueue(Task::RescanAll);
        }
        if self.catch_up.poll(now).is_some() {
            self.catch_up_stale(doc);
        }
        if self.directions.poll(now).is_some() {
            let fixed = direction::fix_directions(doc);
            self.stats.direction_passes += 1;
            log::trace!("[storypoints.pipeline] Direction pass over {} node(s)", fixed);
        }
        self.router.cleanup(now);
        self.run_tasks(doc, now);
    }

    /// When `advance` next has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.full_rescan.deadline(),
            self.catch_up.deadline(),
            self.directions.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// The host's filters changed card visibility: recompute every list.
    pub fn filters_changed(&mut self, doc: &mut dyn Document, now: Instant) {
        log::debug!("[storypoints.pipeline] Filters changed");
        self.enqueue(Task::ComputeAllLists);
        self.run_tasks(doc, now);
    }

    /// Replace the settings. Pickers attached from now on use the new values.
    pub fn update_settings(&mut self, settings: Settings) {
        log::info!(
            "[storypoints.pipeline] Settings updated: {}",
            settings.estimates_sequence
        );
        self.settings = settings;
    }

    /// Pick `value` of `kind` in the open card editor.
    pub fn pick_estimate(
        &mut self,
        doc: &mut dyn Document,
        kind: PointKind,
        value: &str,
    ) -> Option<String> {
        picker::pick(doc, kind, value)
    }

    /// Feed queued observer records back until the page is quiet.
    /// Returns how many batches were handled.
    pub fn settle(&mut self, doc: &mut dyn Document, now: Instant) -> Result<usize, PipelineError> {
        for round in 0..MAX_SETTLE_ROUNDS {
            let records = doc.drain_mutations();
            if records.is_empty() {
                return Ok(round);
            }
            self.handle_mutations(doc, &records, now);
        }
        log::warn!(
            "[storypoints.pipeline] Page still mutating after {} rounds",
            MAX_SETTLE_ROUNDS
        );
        Err(PipelineError::Livelock {
            rounds: MAX_SETTLE_ROUNDS,
        })
    }

    /// Settle, then jump from timer to timer until none is pending.
    /// Returns the instant the pipeline went idle.
    pub fn run_until_idle(
        &mut self,
        doc: &mut dyn Document,
        start: Instant,
    ) -> Result<Instant, PipelineError> {
        let mut now = start;
        self.settle(doc, now)?;
        let mut steps = 0;
        while let Some(deadline) = self.next_deadline() {
            steps += 1;
            if steps > MAX_TIMER_STEPS {
                return Err(PipelineError::Livelock { rounds: steps });
            }
            now = now.max(deadline);
            self.advance(doc, now);
            self.settle(doc, now)?;
        }
        Ok(now)
    }

    // -- internals -------------------------------------------------------------

    fn enqueue(&mut self, task: Task) {
        self.tasks.retain(|t| *t != task);
        self.tasks.push_back(task);
    }

    fn run_tasks(&mut self, doc: &mut dyn Document, now: Instant) {
        let mut steps = 0;
        while let Some(task) = self.tasks.pop_front() {
            steps += 1;
            if steps > MAX_TASKS {
                log::warn!(
                    "[storypoints.pipeline] Dropping {} queued task(s) after {} steps",
                    self.tasks.len() + 1,
                    MAX_TASKS
                );
                self.tasks.clear();
                break;
            }
            match task {
                Task::RescanAll => self.rescan_all(doc, now),
                Task::ComputeAllLists => {
                    for list in doc.lists() {
                        self.enqueue(Task::ComputeList(list));
                    }
                }
                Task::ComputeList(list) => self.compute_list(doc, list, now),
                Task::ComputeBoard => {
                    self.board.recompute(doc);
                    self.stats.board_recomputes += 1;
                }
            }
        }
    }

    fn prune(&mut self, doc: &dyn Document) {
        let cards = self.cards.len();
        let lists = self.lists.len();
        self.cards.retain(|card, _| doc.contains(*card));
        self.lists.retain(|list, _| doc.contains(*list));
        self.stale.retain(|list| doc.contains(*list));
        if cards != self.cards.len() || lists != self.lists.len() {
            log::debug!(
                "[storypoints.pipeline] Pruned {} card(s), {} list(s)",
                cards - self.cards.len(),
                lists - self.lists.len()
            );
        }
    }

    fn rescan_all(&mut self, doc: &mut dyn Document, now: Instant) {
        self.stats.full_rescans += 1;
        self.prune(&*doc);
        for list in doc.lists() {
            if !self.ensure_list(doc, list, now) {
                self.read_cards(doc, list, now);
            }
        }
    }

    /// Register `list` if it is new. Returns whether it was.
    fn ensure_list(&mut self, doc: &mut dyn Document, list: NodeId, now: Instant) -> bool {
        if self.lists.contains_key(&list) {
            return false;
        }
        let mut agg = ListAggregator::new(list, self.config.header_delay, self.config.list_delay);
        agg.request_refresh(&*doc, now);
        log::info!(
            "[storypoints.pipeline] Registered list {} (kanban limit {:?})",
            list,
            agg.kanban_limit()
        );
        self.lists.insert(list, agg);
        self.read_cards(doc, list, now);
        true
    }

    /// Refresh every card of `list`, registering new ones, then recompute it.
    fn read_cards(&mut self, doc: &mut dyn Document, list: NodeId, now: Instant) {
        for card in doc.cards(list) {
            self.refresh_card(doc, card, false, now);
        }
        self.enqueue(Task::ComputeList(list));
    }

    fn refresh_card(&mut self, doc: &mut dyn Document, card: NodeId, force: bool, now: Instant) {
        let delay = self.config.card_delay;
        let agg = self
            .cards
            .entry(card)
            .or_insert_with(|| CardAggregator::new(card, delay));
        let mut ran = false;
        for kind in PointKind::ALL {
            let outcome = if force {
                agg.force_refresh(kind, doc, &mut self.router, now)
            } else {
                agg.request_refresh(kind, doc, &mut self.router, now)
            };
            if let Some(outcome) = outcome {
                ran = true;
                self.stats.card_refreshes += 1;
                if outcome.title_rewritten {
                    self.stats.title_rewrites += 1;
                }
            }
        }
        if ran {
            if let Some(list) = doc.list_of(card) {
                self.enqueue(Task::ComputeList(list));
            }
        }
    }

    fn compute_list(&mut self, doc: &mut dyn Document, list: NodeId, now: Instant) {
        if !doc.contains(list) {
            self.lists.remove(&list);
            self.stale.remove(&list);
            return;
        }
        if self.ensure_list(doc, list, now) {
            // Registration queued a recompute of its own.
            return;
        }
        let Some(agg) = self.lists.get_mut(&list) else {
            return;
        };
        if !agg.request_recompute(now) {
            self.stats.coalesced_recomputes += 1;
            self.stale.insert(list);
            self.catch_up.trigger(now, ());
            return;
        }
        self.stale.remove(&list);
        let tally = agg.recompute(doc, &self.cards);
        self.stats.list_recomputes += 1;
        log::debug!(
            "[storypoints.list.recompute] {} totals {:?}",
            list,
            tally.totals
        );
        self.enqueue(Task::ComputeBoard);
    }

    fn refresh_header(&mut self, doc: &mut dyn Document, list: NodeId, now: Instant) {
        let Some(agg) = self.lists.get_mut(&list) else {
            self.ensure_list(doc, list, now);
            return;
        };
        match agg.request_refresh(&*doc, now) {
            Some(true) => self.enqueue(Task::ComputeList(list)),
            Some(false) => {}
            None => {
                self.catch_up.trigger(now, ());
            }
        }
    }

    fn hydrate(&mut self, doc: &mut dyn Document, card: NodeId, now: Instant) {
        let Some(list) = doc.list_of(card) else {
            return;
        };
        if self.ensure_list(doc, list, now) {
            return;
        }
        log::debug!("[storypoints.pipeline] Card {} hydrated, refreshing", card);
        self.refresh_card(doc, card, true, now);
    }

    fn catch_up_stale(&mut self, doc: &dyn Document) {
        let mut changed = Vec::new();
        for (list, agg) in self.lists.iter_mut() {
            if agg.is_header_stale() && agg.parse_limit(doc) {
                changed.push(*list);
            }
        }
        let stale = std::mem::take(&mut self.stale);
        log::debug!(
            "[storypoints.pipeline] Catching up {} stale list(s), {} header(s)",
            stale.len(),
            changed.len()
        );
        for list in stale.into_iter().chain(changed) {
            self.enqueue(Task::ComputeList(list));
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default(), Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryPage;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn total(page: &MemoryPage, list: NodeId, kind: PointKind) -> String {
        page.list_total_text(list, kind).unwrap_or_default()
    }

    #[test]
    fn test_start_renders_everything() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "(3) Build API [1]");
        page.add_card(list, "(2) Write docs");
        page.drain_mutations();

        let mut pipeline = Pipeline::default();
        pipeline.start(&mut page, Instant::now());

        assert_eq!(total(&page, list, PointKind::Estimate), "5");
        assert_eq!(total(&page, list, PointKind::Consumed), "1");
        assert_eq!(page.board_total_text(PointKind::Estimate).as_deref(), Some("5"));
        assert_eq!(page.card_title_text(card).as_deref(), Some("Build API"));
        assert_eq!(pipeline.registered_cards(), 2);
        assert_eq!(pipeline.stats().list_recomputes, 1);
        assert_eq!(pipeline.stats().board_recomputes, 1);
    }

    #[test]
    fn test_own_writes_do_not_trigger_rescan() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        page.add_card(list, "(3) a");
        page.drain_mutations();

        let mut pipeline = Pipeline::default();
        let t0 = Instant::now();
        pipeline.start(&mut page, t0);
        pipeline.settle(&mut page, t0).unwrap();
        assert_eq!(pipeline.stats().full_rescans, 1);
        assert!(pipeline.full_rescan.deadline().is_none());
    }

    #[test]
    fn test_coalesced_recompute_catches_up() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        page.add_card(list, "(3) a");
        page.drain_mutations();

        let mut pipeline = Pipeline::default();
        let t0 = Instant::now();
        pipeline.start(&mut page, t0);
        page.drain_mutations();

        // A filter change inside the window is coalesced, not lost.
        let hidden = page.cards(list)[0];
        page.set_hidden(hidden, true);
        pipeline.filters_changed(&mut page, t0 + ms(100));
        assert_eq!(total(&page, list, PointKind::Estimate), "3");
        assert_eq!(pipeline.stale_lists(), vec![list]);

        // The direction pass armed at start comes due first.
        assert_eq!(pipeline.next_deadline(), Some(t0 + ms(500)));
        assert_eq!(pipeline.catch_up.deadline(), Some(t0 + ms(600)));
        pipeline.advance(&mut page, t0 + ms(600));
        assert_eq!(total(&page, list, PointKind::Estimate), "");
        assert!(pipeline.stale_lists().is_empty());
    }

    #[test]
    fn test_structural_change_rescans_after_quiet() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        page.add_card(list, "(3) a");
        page.drain_mutations();

        let mut pipeline = Pipeline::default();
        let t0 = Instant::now();
        pipeline.start(&mut page, t0);
        let idle = pipeline.run_until_idle(&mut page, t0).unwrap();

        page.add_card(list, "(5) b");
        let records = page.drain_mutations();
        let routed = pipeline.handle_mutations(&mut page, &records, idle);
        assert!(routed.is_structural());
        assert_eq!(total(&page, list, PointKind::Estimate), "3");

        pipeline.run_until_idle(&mut page, idle).unwrap();
        assert_eq!(total(&page, list, PointKind::Estimate), "8");
        assert_eq!(pipeline.stats().full_rescans, 2);
    }

    #[test]
    fn test_header_change_updates_overflow() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Doing <5>");
        page.add_card(list, "(2) a");
        page.add_card(list, "b");
        page.drain_mutations();

        let mut pipeline = Pipeline::default();
        let t0 = Instant::now();
        pipeline.start(&mut page, t0);
        let idle = pipeline.run_until_idle(&mut page, t0).unwrap();
        assert!(!page.is_overflowing(list));

        page.rename_list(list, "Doing <2>");
        pipeline.settle(&mut page, idle).unwrap();
        pipeline.run_until_idle(&mut page, idle).unwrap();
        assert_eq!(pipeline.list(list).and_then(|l| l.kanban_limit()), Some(2.0));
        assert!(page.is_overflowing(list));
    }

    #[test]
    fn test_removed_card_is_dropped_from_registry() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let a = page.add_card(list, "(3) a");
        page.add_card(list, "(1) b");
        page.drain_mutations();

        let mut pipeline = Pipeline::default();
        let t0 = Instant::now();
        pipeline.start(&mut page, t0);
        let idle = pipeline.run_until_idle(&mut page, t0).unwrap();

        page.remove(a);
        pipeline.run_until_idle(&mut page, idle).unwrap();
        assert!(pipeline.card(a).is_none());
        assert_eq!(pipeline.registered_cards(), 1);
        assert_eq!(total(&page, list, PointKind::Estimate), "1");
    }
}
