/// Board-wide totals, re-scanned from the rendered list totals every time.
use crate::dom::Document;
use crate::types::{format_total, round2, PerKind, PointKind};

#[derive(Debug, Default)]
pub struct BoardAggregator {
    last: Option<PerKind<f64>>,
}

impl BoardAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_totals(&self) -> Option<PerKind<f64>> {
        self.last
    }

    /// Sum every rendered list total per kind and render the board total.
    ///
    /// Totals that are blank or do not parse count as zero.
    pub fn recompute(&mut self, doc: &mut dyn Document) -> PerKind<f64> {
        let lists = doc.lists();
        let totals = PerKind::from_fn(|kind| {
            let sum: f64 = lists
                .iter()
                .filter_map(|list| doc.list_total_text(*list, kind))
                .map(|text| text.trim().parse::<f64>().unwrap_or(0.0))
                .sum();
            round2(sum)
        });

        for kind in PointKind::ALL {
            let text = format_total(totals[kind]);
            if doc.board_total_text(kind).as_deref() != Some(text.as_str()) {
                doc.render_board_total(kind, &text);
            }
        }
        log::debug!(
            "[storypoints.board.recompute] {} list(s), totals {:?}",
            lists.len(),
            totals
        );
        self.last = Some(totals);
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryPage;

    #[test]
    fn test_sums_rendered_list_totals() {
        let mut page = MemoryPage::new();
        let a = page.add_list("A");
        let b = page.add_list("B");
        page.add_list("C");
        page.render_list_total(a, PointKind::Estimate, "3.5");
        page.render_list_total(b, PointKind::Estimate, "2");
        page.render_list_total(b, PointKind::Consumed, "");

        let mut board = BoardAggregator::new();
        let totals = board.recompute(&mut page);
        assert_eq!(totals.estimate, 5.5);
        assert_eq!(totals.consumed, 0.0);
        assert_eq!(page.board_total_text(PointKind::Estimate).as_deref(), Some("5.5"));
        assert_eq!(page.board_total_text(PointKind::Consumed).as_deref(), Some(""));
    }

    #[test]
    fn test_unchanged_totals_are_not_rewritten() {
        let mut page = MemoryPage::new();
        let a = page.add_list("A");
        page.render_list_total(a, PointKind::Estimate, "8");
        let mut board = BoardAggregator::new();
        board.recompute(&mut page);
        page.drain_mutations();

        board.recompute(&mut page);
        assert_eq!(page.pending_mutations(), 0);
        assert_eq!(board.last_totals().map(|t| t.estimate), Some(8.0));
    }
}
