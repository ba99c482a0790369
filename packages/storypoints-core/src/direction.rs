/// Writing direction of free text, from a count of Latin vs Arabic/Hebrew letters.
use crate::dom::Document;
use crate::types::TextDirection;

/// Stop counting after this many directional characters.
const SAMPLE_LIMIT: usize = 256;

pub fn detect(text: &str) -> TextDirection {
    let mut ltr = 0usize;
    let mut rtl = 0usize;
    for c in text.chars() {
        match c {
            'A'..='z' => ltr += 1,
            '\u{0600}'..='\u{06FF}' | '\u{05C0}'..='\u{05F4}' => rtl += 1,
            _ => {}
        }
        if ltr + rtl > SAMPLE_LIMIT {
            break;
        }
    }
    if rtl > ltr {
        TextDirection::Rtl
    } else {
        TextDirection::Ltr
    }
}

/// Apply the detected direction to every direction target on the page.
pub fn fix_directions(doc: &mut dyn Document) -> usize {
    let targets = doc.direction_targets();
    for node in &targets {
        let text = doc.text(*node).unwrap_or_default();
        doc.set_direction(*node, detect(&text));
    }
    targets.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryPage, Role};

    #[test]
    fn test_detect() {
        assert_eq!(detect("Fix the login bug"), TextDirection::Ltr);
        assert_eq!(detect("رفع باگ ورود"), TextDirection::Rtl);
        assert_eq!(detect("תיקון באג"), TextDirection::Rtl);
        assert_eq!(detect("(3) 123"), TextDirection::Ltr);
        assert_eq!(detect(""), TextDirection::Ltr);
    }

    #[test]
    fn test_mixed_text_majority_wins() {
        assert_eq!(detect("API رفع باگ ورود کاربر"), TextDirection::Rtl);
        assert_eq!(detect("Login page رفع"), TextDirection::Ltr);
    }

    #[test]
    fn test_only_sample_is_counted() {
        let text = format!("{}{}", "a".repeat(300), "ب".repeat(400));
        assert_eq!(detect(&text), TextDirection::Ltr);
    }

    #[test]
    fn test_fix_directions_on_page() {
        let mut page = MemoryPage::new();
        let list = page.add_list("Todo");
        let card = page.add_card(list, "رفع باگ");
        let note = page.add_node(page.root(), Role::Markdown, Some("Notes"));
        page.drain_mutations();

        assert_eq!(fix_directions(&mut page), 2);
        let title = page.card_title(card).unwrap();
        assert_eq!(page.direction(title), Some(TextDirection::Rtl));
        assert_eq!(page.direction(note), Some(TextDirection::Ltr));
        assert_eq!(page.pending_mutations(), 0);
    }
}
