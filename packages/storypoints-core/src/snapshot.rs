/// Board snapshots (input) and reports (output).
///
/// A snapshot describes a rendered board well enough to seed a `MemoryPage`.
/// A report reads the rendered totals back, together with the parsed kanban
/// limits the pipeline holds.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dom::{Document, MemoryPage};
use crate::pipeline::Pipeline;
use crate::types::{NodeId, PerKind, PointKind};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Invalid snapshot: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lists: Vec<ListSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSnapshot {
    pub title: String,
    #[serde(default)]
    pub cards: Vec<CardSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub title: String,
    /// Hidden by the host's filters.
    #[serde(default)]
    pub hidden: bool,
    /// Drag placeholder, never counted.
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

impl BoardSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Build the board on `page`. Returns the created list nodes in order.
    pub fn load_into(&self, page: &mut MemoryPage) -> Vec<NodeId> {
        let mut lists = Vec::with_capacity(self.lists.len());
        for list in &self.lists {
            let list_id = page.add_list(&list.title);
            for card in &list.cards {
                if card.placeholder {
                    page.add_placeholder(list_id);
                    continue;
                }
                let card_id = page.add_card(list_id, &card.title);
                if card.hidden {
                    page.set_hidden(card_id, true);
                }
                if let Some(short_id) = &card.short_id {
                    page.hydrate_card(card_id, short_id);
                }
            }
            lists.push(list_id);
        }
        lists
    }

    /// A fresh page holding this board.
    pub fn to_page(&self) -> MemoryPage {
        let mut page = MemoryPage::new();
        self.load_into(&mut page);
        page
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReport {
    pub title: String,
    pub kanban_limit: Option<f64>,
    /// Rendered totals, blank when zero.
    pub totals: PerKind<String>,
    pub occupancy: f64,
    pub overflowing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardReport {
    pub lists: Vec<ListReport>,
    pub totals: PerKind<String>,
}

impl BoardReport {
    pub fn collect(doc: &dyn Document, pipeline: &Pipeline) -> Self {
        let lists = doc
            .lists()
            .into_iter()
            .map(|list| {
                let agg = pipeline.list(list);
                ListReport {
                    title: doc
                        .list_header(list)
                        .and_then(|h| doc.text(h))
                        .unwrap_or_default(),
                    kanban_limit: agg.and_then(|a| a.kanban_limit()),
                    totals: PerKind::from_fn(|kind| {
                        doc.list_total_text(list, kind).unwrap_or_default()
                    }),
                    occupancy: agg
                        .and_then(|a| a.last_tally())
                        .map_or(0.0, |t| t.occupancy),
                    overflowing: agg.is_some_and(|a| a.is_overflowing()),
                }
            })
            .collect();
        Self {
            lists,
            totals: PerKind::from_fn(|kind| doc.board_total_text(kind).unwrap_or_default()),
        }
    }

    /// Plain-text table for the terminal.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for list in &self.lists {
            let limit = list
                .kanban_limit
                .map(|l| format!(" limit {}", l))
                .unwrap_or_default();
            out.push_str(&format!(
                "{:<32} {:>8} {:>8}{}{}\n",
                list.title,
                list.totals[PointKind::Estimate],
                list.totals[PointKind::Consumed],
                limit,
                if list.overflowing { " OVERFLOW" } else { "" }
            ));
        }
        out.push_str(&format!(
            "{:<32} {:>8} {:>8}\n",
            "Board",
            self.totals[PointKind::Estimate],
            self.totals[PointKind::Consumed]
        ));
        out
    }
}
