/// Types shared by the title echo tracker and the mutation router.
use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// SHA-256 of a card title as written into the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TitleFingerprint(pub String);

impl TitleFingerprint {
    pub fn of(title: &str) -> Self {
        use sha2::{Digest, Sha256};
        Self(hex::encode(Sha256::digest(title.as_bytes())))
    }
}

/// How much work a mutation batch calls for. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationClass {
    /// Host churn or the pipeline's own writes.
    Ignorable,
    /// Only an estimate badge changed: totals need recomputing.
    BadgeOnly,
    /// Anything else: rescan every list.
    Structural,
}

/// Outcome of routing one batch of mutation records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutedBatch {
    /// Strongest class found in the batch, `None` for an empty batch.
    pub class: Option<MutationClass>,
    /// Lists whose header text changed.
    pub header_changes: Vec<NodeId>,
    /// Cards whose short id just appeared.
    pub hydrated_cards: Vec<NodeId>,
    /// Cards removed from the page.
    pub removed_cards: Vec<NodeId>,
}

impl RoutedBatch {
    pub fn is_structural(&self) -> bool {
        self.class == Some(MutationClass::Structural)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.class, None | Some(MutationClass::Ignorable))
            && self.header_changes.is_empty()
            && self.hydrated_cards.is_empty()
            && self.removed_cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_fingerprint_is_exact() {
        assert_eq!(TitleFingerprint::of("Fix bug"), TitleFingerprint::of("Fix bug"));
        assert_ne!(TitleFingerprint::of("(3) Fix bug"), TitleFingerprint::of("Fix bug"));
        assert_ne!(TitleFingerprint::of("Fix bug "), TitleFingerprint::of("Fix bug"));
        assert_eq!(TitleFingerprint::of("").0.len(), 64);
    }

    #[test]
    fn test_class_ordering() {
        assert!(MutationClass::Structural > MutationClass::BadgeOnly);
        assert!(MutationClass::BadgeOnly > MutationClass::Ignorable);
        let strongest = [MutationClass::Ignorable, MutationClass::Structural, MutationClass::BadgeOnly]
            .into_iter()
            .max();
        assert_eq!(strongest, Some(MutationClass::Structural));
    }
}
