/// Async host loop.
///
/// Runs the pipeline against a page on the current task: page events arrive
/// over an mpsc channel, timers are slept on until the pipeline's next
/// deadline, and every step is followed by feeding the page's queued records
/// back through the router until it is quiet.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::config::Settings;
use crate::dom::{Document, MutationRecord};
use crate::pipeline::Pipeline;
use crate::types::PointKind;

/// A host-side change to apply to the page.
pub type HostEdit<D> = Box<dyn FnOnce(&mut D) + Send>;

pub enum PageEvent<D> {
    /// The host changed the page; its records are picked up on settle.
    Host(HostEdit<D>),
    /// Records observed elsewhere, routed as they are.
    Mutations(Vec<MutationRecord>),
    FiltersChanged,
    SettingsChanged(Settings),
    EstimatePicked { kind: PointKind, value: String },
}

fn settle<D: Document>(pipeline: &mut Pipeline, doc: &mut D, now: std::time::Instant) {
    if let Err(e) = pipeline.settle(doc, now) {
        log::error!("[storypoints.driver] {}", e);
    }
}

/// Drive `pipeline` until `events` is closed and no timer is pending.
/// Returns the pipeline and the page for inspection.
pub async fn run<D: Document>(
    mut pipeline: Pipeline,
    mut doc: D,
    mut events: mpsc::Receiver<PageEvent<D>>,
) -> (Pipeline, D) {
    let now = Instant::now().into_std();
    pipeline.start(&mut doc, now);
    settle(&mut pipeline, &mut doc, now);

    let mut open = true;
    loop {
        let deadline = pipeline.next_deadline();
        if !open && deadline.is_none() {
            break;
        }
        // Far-future fallback keeps the branch well-formed when disabled.
        let wake = deadline
            .map(Instant::from_std)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            event = events.recv(), if open => {
                let now = Instant::now().into_std();
                match event {
                    Some(PageEvent::Host(edit)) => edit(&mut doc),
                    Some(PageEvent::Mutations(records)) => {
                        pipeline.handle_mutations(&mut doc, &records, now);
                    }
                    Some(PageEvent::FiltersChanged) => pipeline.filters_changed(&mut doc, now),
                    Some(PageEvent::SettingsChanged(settings)) => {
                        pipeline.update_settings(settings);
                    }
                    Some(PageEvent::EstimatePicked { kind, value }) => {
                        if pipeline.pick_estimate(&mut doc, kind, &value).is_none() {
                            log::warn!(
                                "[storypoints.driver] Pick of {:?} {} ignored: no editor or bad value",
                                kind,
                                value
                            );
                        }
                    }
                    None => {
                        log::debug!("[storypoints.driver] Event channel closed");
                        open = false;
                    }
                }
                settle(&mut pipeline, &mut doc, now);
            }
            _ = sleep_until(wake), if deadline.is_some() => {
                let now = Instant::now().into_std();
                pipeline.advance(&mut doc, now);
                settle(&mut pipeline, &mut doc, now);
            }
        }
    }
    log::debug!(
        "[storypoints.driver] Idle after {} batch(es)",
        pipeline.stats().batches
    );
    (pipeline, doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryPage;

    #[tokio::test(start_paused = true)]
    async fn test_runs_to_idle_without_events() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        page.add_card(list, "(3) a");
        page.add_card(list, "(5) b [2]");
        page.drain_mutations();

        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        let (pipeline, page) = run(Pipeline::default(), page, rx).await;

        assert_eq!(page.list_total_text(list, PointKind::Estimate).as_deref(), Some("8"));
        assert_eq!(page.list_total_text(list, PointKind::Consumed).as_deref(), Some("2"));
        assert_eq!(page.board_total_text(PointKind::Estimate).as_deref(), Some("8"));
        assert!(pipeline.next_deadline().is_none());
        assert!(pipeline.stats().direction_passes >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_edits_and_picks() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "(3) a");
        page.drain_mutations();

        let (tx, rx) = mpsc::channel(8);
        tx.send(PageEvent::Host(Box::new(move |page: &mut MemoryPage| {
            page.add_card(list, "(2) b");
        })))
        .await
        .unwrap();
        tx.send(PageEvent::Host(Box::new(move |page: &mut MemoryPage| {
            page.open_editor(card, "(3) a");
        })))
        .await
        .unwrap();
        tx.send(PageEvent::EstimatePicked {
            kind: PointKind::Estimate,
            value: "8".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        let (pipeline, page) = run(Pipeline::default(), page, rx).await;
        assert_eq!(page.card_title_text(card).as_deref(), Some("a"));
        assert_eq!(
            pipeline.card(card).map(|c| c.value(PointKind::Estimate).display().to_string()),
            Some("8".to_string())
        );
        assert_eq!(page.list_total_text(list, PointKind::Estimate).as_deref(), Some("10"));
    }
}
