/// Title marker codec.
///
/// Point values live inline in free-text titles as `(3)` estimates, `[2]`
/// consumed points and `<5>` kanban limits. A marker is recognized when it
/// sits at the start of the text or after whitespace, and swallows one
/// trailing whitespace character. Only the first marker of each kind counts.
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::types::{MarkerKind, PointValue};

// Group 1: leading start-or-whitespace, 2: token, 3: closing delimiter, 4: trailing whitespace.
static ESTIMATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)((?:^|\s))\((\?|[0-9]*\.?[0-9]+)(\))(\s?)").expect("valid estimate marker regex")
});
static CONSUMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)((?:^|\s))\[(\?|[0-9]*\.?[0-9]+)(\])(\s?)").expect("valid consumed marker regex")
});
static KANBAN_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)((?:^|\s))<(\?|[0-9]*\.?[0-9]+)(>)(\s?)").expect("valid kanban limit regex")
});
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\?|[0-9]*\.?[0-9]+)$").expect("valid token regex")
});

fn marker_re(kind: MarkerKind) -> &'static Regex {
    match kind {
        MarkerKind::Estimate => &*ESTIMATE_RE,
        MarkerKind::Consumed => &*CONSUMED_RE,
        MarkerKind::KanbanLimit => &*KANBAN_LIMIT_RE,
    }
}

/// Result of decoding one marker kind out of a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The marker token as written (`"3"`, `".5"`, `"?"`), `None` when absent.
    pub token: Option<String>,
    /// The title with the marker removed, or the input unchanged when absent.
    pub stripped: String,
}

impl Decoded {
    pub fn value(&self) -> PointValue {
        PointValue::from_token(self.token.as_deref())
    }
}

/// Check whether `token` is something a marker can hold.
pub fn is_valid_token(token: &str) -> bool {
    TOKEN_RE.is_match(token)
}

/// Decode the first marker of `kind` in `title`.
pub fn decode(title: &str, kind: MarkerKind) -> Decoded {
    match marker_re(kind).captures(title) {
        Some(caps) => {
            let token = caps[2].to_string();
            let stripped = marker_re(kind)
                .replacen(title, 1, "${1}")
                .trim()
                .to_string();
            Decoded {
                token: Some(token),
                stripped,
            }
        }
        None => Decoded {
            token: None,
            stripped: title.to_string(),
        },
    }
}

/// Extract just the token of the first marker of `kind`.
pub fn extract_token(title: &str, kind: MarkerKind) -> Option<String> {
    marker_re(kind).captures(title).map(|caps| caps[2].to_string())
}

/// Remove the estimate and consumed markers from a card title.
///
/// Applied cumulatively: the estimate marker first, then the consumed marker
/// on what remains, then whitespace trimmed.
pub fn strip_markers(title: &str) -> String {
    let without_estimate = ESTIMATE_RE.replacen(title, 1, "${1}");
    CONSUMED_RE
        .replacen(&without_estimate, 1, "${1}")
        .trim()
        .to_string()
}

/// Write `token` into `title` as a marker of `kind`.
///
/// An existing marker is replaced in place, keeping the whitespace around it.
/// Otherwise estimates are prepended (`(3) title`) and every other kind is
/// appended (`title [3]`).
pub fn encode(title: &str, kind: MarkerKind, token: &str) -> String {
    let re = marker_re(kind);
    if re.is_match(title) {
        return re
            .replacen(title, 1, |caps: &Captures| {
                format!("{}{}{}", &caps[1], kind.format(token), &caps[4])
            })
            .to_string();
    }
    match kind {
        MarkerKind::Estimate => format!("{} {}", kind.format(token), title),
        _ => format!("{} {}", title, kind.format(token)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_leading_estimate() {
        let decoded = decode("(5) Fix bug", MarkerKind::Estimate);
        assert_eq!(decoded.token.as_deref(), Some("5"));
        assert_eq!(decoded.stripped, "Fix bug");
        assert_eq!(decoded.value(), PointValue::Number(5.0));
    }

    #[test]
    fn test_decode_marker_mid_title_keeps_word_gap() {
        let decoded = decode("Fix (3) bug", MarkerKind::Estimate);
        assert_eq!(decoded.token.as_deref(), Some("3"));
        assert_eq!(decoded.stripped, "Fix bug");
    }

    #[test]
    fn test_decode_absent_leaves_title_untouched() {
        for title in ["Fix bug", "  padded  ", "f(3) glued", "(abc) words", ""] {
            let decoded = decode(title, MarkerKind::Estimate);
            assert_eq!(decoded.token, None);
            assert_eq!(decoded.stripped, title);
            assert_eq!(decoded.value(), PointValue::Absent);
        }
    }

    #[test]
    fn test_decode_question_mark_and_decimals() {
        assert_eq!(
            decode("(?) Spike", MarkerKind::Estimate).token.as_deref(),
            Some("?")
        );
        assert_eq!(
            decode("(.5) Tiny", MarkerKind::Estimate).token.as_deref(),
            Some(".5")
        );
        assert_eq!(
            decode("Task [1.25]", MarkerKind::Consumed).token.as_deref(),
            Some("1.25")
        );
    }

    #[test]
    fn test_decode_first_match_wins() {
        let decoded = decode("(2) Task (8)", MarkerKind::Estimate);
        assert_eq!(decoded.token.as_deref(), Some("2"));
        assert_eq!(decoded.stripped, "Task (8)");
    }

    #[test]
    fn test_kinds_are_independent() {
        let title = "(3) Build API [1]";
        assert_eq!(extract_token(title, MarkerKind::Estimate).as_deref(), Some("3"));
        assert_eq!(extract_token(title, MarkerKind::Consumed).as_deref(), Some("1"));
        assert_eq!(extract_token(title, MarkerKind::KanbanLimit), None);
        assert_eq!(
            extract_token("Doing <4>", MarkerKind::KanbanLimit).as_deref(),
            Some("4")
        );
    }

    #[test]
    fn test_strip_markers_is_cumulative() {
        assert_eq!(strip_markers("(3) Build API [1]"), "Build API");
        assert_eq!(strip_markers("[1] (3) Build API"), "Build API");
        assert_eq!(strip_markers("Build API"), "Build API");
        // Stripping an already stripped title changes nothing.
        assert_eq!(strip_markers(&strip_markers("(3) x [2]")), "x");
    }

    #[test]
    fn test_encode_prepends_estimate_and_round_trips() {
        let encoded = encode("Fix bug", MarkerKind::Estimate, "5");
        assert_eq!(encoded, "(5) Fix bug");
        let decoded = decode(&encoded, MarkerKind::Estimate);
        assert_eq!(decoded.token.as_deref(), Some("5"));
        assert_eq!(decoded.stripped, "Fix bug");
    }

    #[test]
    fn test_encode_appends_consumed() {
        let encoded = encode("Fix bug", MarkerKind::Consumed, "2");
        assert_eq!(encoded, "Fix bug [2]");
        assert_eq!(extract_token(&encoded, MarkerKind::Consumed).as_deref(), Some("2"));
    }

    #[test]
    fn test_encode_replaces_in_place() {
        assert_eq!(encode("Fix (3) bug", MarkerKind::Estimate, "8"), "Fix (8) bug");
        assert_eq!(encode("(3) Fix bug", MarkerKind::Estimate, "?"), "(?) Fix bug");
        assert_eq!(encode("Fix bug [1]", MarkerKind::Consumed, "2"), "Fix bug [2]");
        assert_eq!(encode("Fix [1] bug", MarkerKind::Consumed, "2"), "Fix [2] bug");
    }

    #[test]
    fn test_valid_tokens() {
        for token in ["?", "0", "0.5", ".5", "21"] {
            assert!(is_valid_token(token), "{token}");
        }
        for token in ["", "abc", "1.", "-1", "??", "1 2"] {
            assert!(!is_valid_token(token), "{token}");
        }
    }
}
