use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Stable identifier of a node in the observed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Delimiter syntax of an inline marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerKind {
    /// `(5)` in card titles.
    Estimate,
    /// `[5]` in card titles.
    Consumed,
    /// `<5>` in list headers.
    KanbanLimit,
}

impl MarkerKind {
    pub fn delimiters(self) -> (char, char) {
        match self {
            Self::Estimate => ('(', ')'),
            Self::Consumed => ('[', ']'),
            Self::KanbanLimit => ('<', '>'),
        }
    }

    /// Format a marker holding `token`, e.g. `(3)`.
    pub fn format(self, token: &str) -> String {
        let (open, close) = self.delimiters();
        format!("{}{}{}", open, token, close)
    }
}

/// A named category of point value carried by cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointKind {
    Estimate,
    Consumed,
}

impl PointKind {
    /// Every kind, in render order.
    pub const ALL: [PointKind; 2] = [PointKind::Estimate, PointKind::Consumed];

    pub fn marker(self) -> MarkerKind {
        match self {
            Self::Estimate => MarkerKind::Estimate,
            Self::Consumed => MarkerKind::Consumed,
        }
    }

    pub fn is_consumed(self) -> bool {
        matches!(self, Self::Consumed)
    }

    pub fn picker_title(self) -> &'static str {
        match self {
            Self::Estimate => "Estimated Points",
            Self::Consumed => "Consumed Points",
        }
    }
}

/// One value per point kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerKind<T> {
    pub estimate: T,
    pub consumed: T,
}

impl<T> PerKind<T> {
    pub fn from_fn(mut f: impl FnMut(PointKind) -> T) -> Self {
        Self {
            estimate: f(PointKind::Estimate),
            consumed: f(PointKind::Consumed),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointKind, &T)> {
        [
            (PointKind::Estimate, &self.estimate),
            (PointKind::Consumed, &self.consumed),
        ]
        .into_iter()
    }
}

impl<T> Index<PointKind> for PerKind<T> {
    type Output = T;

    fn index(&self, kind: PointKind) -> &T {
        match kind {
            PointKind::Estimate => &self.estimate,
            PointKind::Consumed => &self.consumed,
        }
    }
}

impl<T> IndexMut<PointKind> for PerKind<T> {
    fn index_mut(&mut self, kind: PointKind) -> &mut T {
        match kind {
            PointKind::Estimate => &mut self.estimate,
            PointKind::Consumed => &mut self.consumed,
        }
    }
}

/// Numeric interpretation of a marker token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointValue {
    /// No marker in the title.
    Absent,
    /// The `?` token.
    Unknown,
    Number(f64),
}

impl PointValue {
    /// Interpret an optional marker token. Malformed numbers read as absent.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            None => Self::Absent,
            Some("?") => Self::Unknown,
            Some(t) => match t.parse::<f64>() {
                Ok(n) if n.is_finite() => Self::Number(n),
                _ => Self::Absent,
            },
        }
    }

    /// Contribution to a list total: unknown values are skipped, absent counts 0.
    pub fn sum_contribution(self) -> Option<f64> {
        match self {
            Self::Absent => Some(0.0),
            Self::Unknown => None,
            Self::Number(n) => Some(n),
        }
    }

    /// Contribution to kanban occupancy: an unestimated card still takes a slot.
    pub fn occupancy_contribution(self) -> Option<f64> {
        match self {
            Self::Absent => Some(1.0),
            Self::Unknown => None,
            Self::Number(n) => Some(n),
        }
    }
}

/// Round to two decimals, the precision totals are rendered with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a total: blank when it rounds to zero or below.
pub fn format_total(value: f64) -> String {
    let rounded = round2(value);
    if rounded > 0.0 {
        format!("{}", rounded)
    } else {
        String::new()
    }
}

/// Rendered per-card badge for one point kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub text: String,
    pub consumed: bool,
    pub tooltip: String,
}

impl Badge {
    /// Build the badge for a card whose marker token is `points` (blank when absent).
    pub fn new(kind: PointKind, points: &str) -> Self {
        let singular = matches!(
            PointValue::from_token(Some(points)),
            PointValue::Number(n) if n == 1.0
        );
        let tooltip = format!(
            "This card has {}{} storypoint{}",
            points,
            if kind.is_consumed() { " consumed" } else { "" },
            if singular { "." } else { "s." }
        );
        Self {
            text: points.to_string(),
            consumed: kind.is_consumed(),
            tooltip,
        }
    }
}

/// Writing direction applied to text blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}
