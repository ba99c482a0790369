pub mod memory;

use serde::{Deserialize, Serialize};

use crate::types::{Badge, NodeId, PointKind, TextDirection};

pub use memory::MemoryPage;

/// Semantic role of a page node, as far as the pipeline cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Board,
    BoardTotal(PointKind),
    List,
    ListHeader,
    ListTotal(PointKind),
    Card,
    CardTitle,
    CardBadges,
    PointBadge(PointKind),
    ShortId,
    /// Relative timestamps the host refreshes every minute.
    Timestamp,
    /// Activity phrases the host keeps rewriting.
    Phrase,
    Member,
    HeaderButton,
    EditControls,
    Picker(PointKind),
    Markdown,
    WindowTitle,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    ChildList,
    CharacterData,
}

/// One observed change, as a mutation observer would report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub fn character_data(target: NodeId) -> Self {
        Self {
            target,
            kind: MutationKind::CharacterData,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList,
            added,
            removed,
        }
    }
}

/// The host page as seen by the pipeline.
///
/// Implementations adapt a concrete page (a browser DOM, or `MemoryPage`).
/// Nodes the extension creates through this trait must be reported by
/// `is_extension_owned`, including their descendants and after removal.
/// Overflow and direction writes are attribute changes and are not observed.
pub trait Document {
    /// Every rendered list, in board order.
    fn lists(&self) -> Vec<NodeId>;

    /// Cards of a list in order, placeholders excluded.
    fn cards(&self, list: NodeId) -> Vec<NodeId>;

    /// Whether the node is still attached to the page.
    fn contains(&self, node: NodeId) -> bool;

    fn role(&self, node: NodeId) -> Role;

    /// Closest list containing (or being) `node`.
    fn list_of(&self, node: NodeId) -> Option<NodeId>;

    /// Closest card containing (or being) `node`.
    fn card_of(&self, node: NodeId) -> Option<NodeId>;

    fn is_extension_owned(&self, node: NodeId) -> bool;

    /// Own text of a node, `None` when the node carries no text.
    fn text(&self, node: NodeId) -> Option<String>;

    /// Replace the own text of a host node.
    fn set_text(&mut self, node: NodeId, text: &str);

    fn list_header(&self, list: NodeId) -> Option<NodeId>;

    fn list_total_text(&self, list: NodeId, kind: PointKind) -> Option<String>;

    fn render_list_total(&mut self, list: NodeId, kind: PointKind, text: &str);

    fn set_list_overflow(&mut self, list: NodeId, overflowing: bool);

    fn card_title(&self, card: NodeId) -> Option<NodeId>;

    /// Whether the card is shown (not hidden by the host's filters).
    fn is_visible(&self, card: NodeId) -> bool;

    fn card_badge(&self, card: NodeId, kind: PointKind) -> Option<Badge>;

    fn render_card_badge(&mut self, card: NodeId, kind: PointKind, badge: &Badge);

    fn board_total_text(&self, kind: PointKind) -> Option<String>;

    fn render_board_total(&mut self, kind: PointKind, text: &str);

    /// Edit controls of the open card-detail title editor, if any.
    fn card_editor(&self) -> Option<NodeId>;

    fn has_picker(&self, editor: NodeId, kind: PointKind) -> bool;

    fn attach_picker(&mut self, editor: NodeId, kind: PointKind, values: &[String]);

    fn editor_text(&self, editor: NodeId) -> Option<String>;

    /// Put `text` into the editor and save it, as the host's save button would.
    fn submit_editor(&mut self, editor: NodeId, text: &str);

    /// Text blocks whose writing direction follows their content.
    fn direction_targets(&self) -> Vec<NodeId>;

    fn set_direction(&mut self, node: NodeId, direction: TextDirection);

    /// Records queued since the last drain.
    fn drain_mutations(&mut self) -> Vec<MutationRecord>;
}
