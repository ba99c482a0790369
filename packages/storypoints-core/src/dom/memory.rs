/// In-memory page.
///
/// An arena of nodes shaped like the host board (board > lists > cards), with
/// host-side mutation helpers for tests and the CLI. Every write queues the
/// record a mutation observer would deliver. Nodes are never freed, so removed
/// nodes keep answering role and ownership queries.
use super::{Document, MutationRecord, Role};
use crate::types::{Badge, NodeId, PointKind, TextDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Host,
    Extension,
}

#[derive(Debug, Clone)]
struct Node {
    role: Role,
    origin: Origin,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: Option<String>,
    hidden: bool,
    placeholder: bool,
    overflow: bool,
    direction: Option<TextDirection>,
    badge: Option<Badge>,
    values: Vec<String>,
}

impl Node {
    fn new(role: Role, origin: Origin, text: Option<String>) -> Self {
        Self {
            role,
            origin,
            parent: None,
            children: Vec::new(),
            text,
            hidden: false,
            placeholder: false,
            overflow: false,
            direction: None,
            badge: None,
            values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryPage {
    nodes: Vec<Node>,
    root: NodeId,
    /// Open title editor and the card it edits.
    editor: Option<(NodeId, NodeId)>,
    pending: Vec<MutationRecord>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(Role::Board, Origin::Host, None)],
            root: NodeId(0),
            editor: None,
            pending: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Allocate a node and attach it under `parent` without recording anything.
    fn alloc(&mut self, parent: NodeId, mut node: Node, prepend: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        node.parent = Some(parent);
        self.nodes.push(node);
        if let Some(p) = self.node_mut(parent) {
            if prepend {
                p.children.insert(0, id);
            } else {
                p.children.push(id);
            }
        }
        id
    }

    fn child_with_role(&self, parent: NodeId, role: Role) -> Option<NodeId> {
        self.node(parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.node(*c).is_some_and(|n| n.role == role))
    }

    fn closest(&self, node: NodeId, role: Role) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.node(id)?;
            if n.role == role {
                return Some(id);
            }
            current = n.parent;
        }
        None
    }

    fn record(&mut self, record: MutationRecord) {
        self.pending.push(record);
    }

    // -- host-side helpers -------------------------------------------------

    /// Append a list with a header holding `title`.
    pub fn add_list(&mut self, title: &str) -> NodeId {
        let root = self.root;
        let list = self.alloc(root, Node::new(Role::List, Origin::Host, None), false);
        self.alloc(
            list,
            Node::new(Role::ListHeader, Origin::Host, Some(title.to_string())),
            false,
        );
        self.record(MutationRecord::child_list(root, vec![list], Vec::new()));
        list
    }

    /// Append a card to `list` with a title and an empty badge container.
    pub fn add_card(&mut self, list: NodeId, title: &str) -> NodeId {
        let card = self.alloc(list, Node::new(Role::Card, Origin::Host, None), false);
        self.alloc(
            card,
            Node::new(Role::CardTitle, Origin::Host, Some(title.to_string())),
            false,
        );
        self.alloc(card, Node::new(Role::CardBadges, Origin::Host, None), false);
        self.record(MutationRecord::child_list(list, vec![card], Vec::new()));
        card
    }

    /// Append the drop placeholder the host shows while dragging a card.
    pub fn add_placeholder(&mut self, list: NodeId) -> NodeId {
        let mut node = Node::new(Role::Card, Origin::Host, None);
        node.placeholder = true;
        let card = self.alloc(list, node, false);
        self.alloc(
            card,
            Node::new(Role::CardTitle, Origin::Host, Some(String::new())),
            false,
        );
        self.record(MutationRecord::child_list(list, vec![card], Vec::new()));
        card
    }

    /// Append an arbitrary host node.
    pub fn add_node(&mut self, parent: NodeId, role: Role, text: Option<&str>) -> NodeId {
        let id = self.alloc(
            parent,
            Node::new(role, Origin::Host, text.map(str::to_string)),
            false,
        );
        self.record(MutationRecord::child_list(parent, vec![id], Vec::new()));
        id
    }

    /// The host re-renders a card title.
    pub fn set_card_title(&mut self, card: NodeId, title: &str) {
        if let Some(title_node) = self.child_with_role(card, Role::CardTitle) {
            if let Some(n) = self.node_mut(title_node) {
                n.text = Some(title.to_string());
            }
            self.record(MutationRecord::character_data(title_node));
        }
    }

    /// The host replaces a list header's text node.
    pub fn rename_list(&mut self, list: NodeId, title: &str) {
        if let Some(header) = self.child_with_role(list, Role::ListHeader) {
            if let Some(n) = self.node_mut(header) {
                n.text = Some(title.to_string());
            }
            self.record(MutationRecord::child_list(header, Vec::new(), Vec::new()));
        }
    }

    /// The host's text churn on any node (timestamps, phrases).
    pub fn touch_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            n.text = Some(text.to_string());
        }
        self.record(MutationRecord::character_data(node));
    }

    /// Filters toggle visibility through styling, which is not observed.
    pub fn set_hidden(&mut self, card: NodeId, hidden: bool) {
        if let Some(n) = self.node_mut(card) {
            n.hidden = hidden;
        }
    }

    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
        self.record(MutationRecord::child_list(parent, Vec::new(), vec![node]));
    }

    pub fn move_card(&mut self, card: NodeId, to_list: NodeId) {
        self.remove(card);
        if let Some(n) = self.node_mut(card) {
            n.parent = Some(to_list);
        }
        if let Some(list) = self.node_mut(to_list) {
            list.children.push(card);
        }
        self.record(MutationRecord::child_list(to_list, vec![card], Vec::new()));
    }

    /// The host finishes hydrating a card and inserts its short id.
    pub fn hydrate_card(&mut self, card: NodeId, short_id: &str) -> Option<NodeId> {
        let title = self.child_with_role(card, Role::CardTitle)?;
        let id = self.alloc(
            title,
            Node::new(Role::ShortId, Origin::Host, Some(short_id.to_string())),
            true,
        );
        self.record(MutationRecord::child_list(title, vec![id], Vec::new()));
        Some(id)
    }

    /// Open the card-detail title editor holding `text`.
    pub fn open_editor(&mut self, card: NodeId, text: &str) -> NodeId {
        self.close_editor();
        let root = self.root;
        let editor = self.alloc(
            root,
            Node::new(Role::EditControls, Origin::Host, Some(text.to_string())),
            false,
        );
        self.editor = Some((editor, card));
        self.record(MutationRecord::child_list(root, vec![editor], Vec::new()));
        editor
    }

    pub fn close_editor(&mut self) {
        if let Some((editor, _)) = self.editor.take() {
            self.remove(editor);
        }
    }

    // -- inspection ----------------------------------------------------------

    pub fn card_title_text(&self, card: NodeId) -> Option<String> {
        let title = self.child_with_role(card, Role::CardTitle)?;
        self.node(title)?.text.clone()
    }

    pub fn list_title(&self, list: NodeId) -> Option<String> {
        let header = self.child_with_role(list, Role::ListHeader)?;
        self.node(header)?.text.clone()
    }

    pub fn is_overflowing(&self, list: NodeId) -> bool {
        self.node(list).is_some_and(|n| n.overflow)
    }

    pub fn direction(&self, node: NodeId) -> Option<TextDirection> {
        self.node(node)?.direction
    }

    pub fn picker_values(&self, editor: NodeId, kind: PointKind) -> Option<Vec<String>> {
        let picker = self.child_with_role(editor, Role::Picker(kind))?;
        Some(self.node(picker)?.values.clone())
    }

    pub fn pending_mutations(&self) -> usize {
        self.pending.len()
    }
}

impl Document for MemoryPage {
    fn lists(&self) -> Vec<NodeId> {
        self.node(self.root)
            .map(|root| {
                root.children
                    .iter()
                    .copied()
                    .filter(|c| self.node(*c).is_some_and(|n| n.role == Role::List))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn cards(&self, list: NodeId) -> Vec<NodeId> {
        self.node(list)
            .map(|l| {
                l.children
                    .iter()
                    .copied()
                    .filter(|c| {
                        self.node(*c)
                            .is_some_and(|n| n.role == Role::Card && !n.placeholder)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn contains(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    fn role(&self, node: NodeId) -> Role {
        self.node(node).map(|n| n.role).unwrap_or(Role::Other)
    }

    fn list_of(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, Role::List)
    }

    fn card_of(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, Role::Card)
    }

    fn is_extension_owned(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.node(id) {
                Some(n) if n.origin == Origin::Extension => return true,
                Some(n) => current = n.parent,
                None => return false,
            }
        }
        false
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.node(node)?.text.clone()
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.node_mut(node) {
            n.text = Some(text.to_string());
            self.record(MutationRecord::character_data(node));
        }
    }

    fn list_header(&self, list: NodeId) -> Option<NodeId> {
        self.child_with_role(list, Role::ListHeader)
    }

    fn list_total_text(&self, list: NodeId, kind: PointKind) -> Option<String> {
        let total = self.child_with_role(list, Role::ListTotal(kind))?;
        self.node(total)?.text.clone()
    }

    fn render_list_total(&mut self, list: NodeId, kind: PointKind, text: &str) {
        match self.child_with_role(list, Role::ListTotal(kind)) {
            Some(total) => {
                if let Some(n) = self.node_mut(total) {
                    n.text = Some(text.to_string());
                }
                self.record(MutationRecord::child_list(total, Vec::new(), Vec::new()));
            }
            None => {
                if self.node(list).is_none() {
                    return;
                }
                let node = Node::new(
                    Role::ListTotal(kind),
                    Origin::Extension,
                    Some(text.to_string()),
                );
                let total = self.alloc(list, node, false);
                self.record(MutationRecord::child_list(list, vec![total], Vec::new()));
            }
        }
    }

    fn set_list_overflow(&mut self, list: NodeId, overflowing: bool) {
        if let Some(n) = self.node_mut(list) {
            n.overflow = overflowing;
        }
    }

    fn card_title(&self, card: NodeId) -> Option<NodeId> {
        self.child_with_role(card, Role::CardTitle)
    }

    fn is_visible(&self, card: NodeId) -> bool {
        self.node(card).is_some_and(|n| !n.hidden && !n.placeholder)
    }

    fn card_badge(&self, card: NodeId, kind: PointKind) -> Option<Badge> {
        let badges = self.child_with_role(card, Role::CardBadges)?;
        let badge = self.child_with_role(badges, Role::PointBadge(kind))?;
        self.node(badge)?.badge.clone()
    }

    fn render_card_badge(&mut self, card: NodeId, kind: PointKind, badge: &Badge) {
        let Some(badges) = self.child_with_role(card, Role::CardBadges) else {
            return;
        };
        match self.child_with_role(badges, Role::PointBadge(kind)) {
            Some(existing) => {
                if let Some(n) = self.node_mut(existing) {
                    n.text = Some(badge.text.clone());
                    n.badge = Some(badge.clone());
                }
                self.record(MutationRecord::child_list(existing, Vec::new(), Vec::new()));
            }
            None => {
                let mut node = Node::new(
                    Role::PointBadge(kind),
                    Origin::Extension,
                    Some(badge.text.clone()),
                );
                node.badge = Some(badge.clone());
                let id = self.alloc(badges, node, true);
                self.record(MutationRecord::child_list(badges, vec![id], Vec::new()));
            }
        }
    }

    fn board_total_text(&self, kind: PointKind) -> Option<String> {
        let total = self.child_with_role(self.root, Role::BoardTotal(kind))?;
        self.node(total)?.text.clone()
    }

    fn render_board_total(&mut self, kind: PointKind, text: &str) {
        let root = self.root;
        match self.child_with_role(root, Role::BoardTotal(kind)) {
            Some(total) => {
                if let Some(n) = self.node_mut(total) {
                    n.text = Some(text.to_string());
                }
                self.record(MutationRecord::child_list(total, Vec::new(), Vec::new()));
            }
            None => {
                let node = Node::new(
                    Role::BoardTotal(kind),
                    Origin::Extension,
                    Some(text.to_string()),
                );
                let total = self.alloc(root, node, false);
                self.record(MutationRecord::child_list(root, vec![total], Vec::new()));
            }
        }
    }

    fn card_editor(&self) -> Option<NodeId> {
        self.editor
            .map(|(editor, _)| editor)
            .filter(|editor| self.contains(*editor))
    }

    fn has_picker(&self, editor: NodeId, kind: PointKind) -> bool {
        self.child_with_role(editor, Role::Picker(kind)).is_some()
    }

    fn attach_picker(&mut self, editor: NodeId, kind: PointKind, values: &[String]) {
        if self.node(editor).is_none() {
            return;
        }
        let mut node = Node::new(
            Role::Picker(kind),
            Origin::Extension,
            Some(kind.picker_title().to_string()),
        );
        node.values = values.to_vec();
        let picker = self.alloc(editor, node, false);
        self.record(MutationRecord::child_list(editor, vec![picker], Vec::new()));
    }

    fn editor_text(&self, editor: NodeId) -> Option<String> {
        self.node(editor)?.text.clone()
    }

    fn submit_editor(&mut self, editor: NodeId, text: &str) {
        let Some((open, card)) = self.editor else {
            return;
        };
        if open != editor {
            return;
        }
        if let Some(n) = self.node_mut(editor) {
            n.text = Some(text.to_string());
        }
        self.set_card_title(card, text);
        self.close_editor();
    }

    fn direction_targets(&self) -> Vec<NodeId> {
        (0..self.nodes.len() as u64)
            .map(NodeId)
            .filter(|id| {
                matches!(
                    self.role(*id),
                    Role::Markdown | Role::WindowTitle | Role::CardTitle
                ) && self.contains(*id)
            })
            .collect()
    }

    fn set_direction(&mut self, node: NodeId, direction: TextDirection) {
        if let Some(n) = self.node_mut(node) {
            n.direction = Some(direction);
        }
    }

    fn drain_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MutationKind;

    #[test]
    fn test_structure_queries() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo <3>");
        let card = page.add_card(list, "(2) Write docs");
        page.add_placeholder(list);

        assert_eq!(page.lists(), vec![list]);
        assert_eq!(page.cards(list), vec![card]);
        let title = page.card_title(card).unwrap();
        assert_eq!(page.text(title).as_deref(), Some("(2) Write docs"));
        assert_eq!(page.card_of(title), Some(card));
        assert_eq!(page.list_of(title), Some(list));
        assert_eq!(page.list_title(list).as_deref(), Some("Todo <3>"));
    }

    #[test]
    fn test_extension_nodes_are_origin_tagged() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "Task");
        page.drain_mutations();

        page.render_card_badge(card, PointKind::Estimate, &Badge::new(PointKind::Estimate, "3"));
        page.render_list_total(list, PointKind::Estimate, "3");
        let records = page.drain_mutations();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.kind, MutationKind::ChildList);
            assert!(!page.is_extension_owned(record.target));
            assert!(record.added.iter().all(|n| page.is_extension_owned(*n)));
        }
        assert!(!page.is_extension_owned(card));
    }

    #[test]
    fn test_rerender_badge_targets_badge_node() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "Task");
        page.render_card_badge(card, PointKind::Estimate, &Badge::new(PointKind::Estimate, "3"));
        page.drain_mutations();

        page.render_card_badge(card, PointKind::Estimate, &Badge::new(PointKind::Estimate, "5"));
        let records = page.drain_mutations();
        assert_eq!(records.len(), 1);
        assert_eq!(page.role(records[0].target), Role::PointBadge(PointKind::Estimate));
        assert_eq!(
            page.card_badge(card, PointKind::Estimate).map(|b| b.text),
            Some("5".to_string())
        );
    }

    #[test]
    fn test_removed_nodes_are_detached() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "Task");
        page.remove(card);
        assert!(!page.contains(card));
        assert!(page.cards(list).is_empty());
        assert_eq!(page.role(card), Role::Card);
    }

    #[test]
    fn test_move_card_between_lists() {
        let mut page = MemoryPage::new();
        let a = page.add_list("A");
        let b = page.add_list("B");
        let card = page.add_card(a, "Task");
        page.move_card(card, b);
        assert!(page.cards(a).is_empty());
        assert_eq!(page.cards(b), vec![card]);
        assert_eq!(page.list_of(card), Some(b));
    }

    #[test]
    fn test_submit_editor_rewrites_title_and_closes() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "Task");
        let editor = page.open_editor(card, "Task");
        assert_eq!(page.card_editor(), Some(editor));

        page.submit_editor(editor, "(3) Task");
        assert_eq!(page.card_title_text(card).as_deref(), Some("(3) Task"));
        assert_eq!(page.card_editor(), None);
    }
}
