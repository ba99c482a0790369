/// Board export as a spreadsheet-openable HTML table.
///
/// Input is the host's board export JSON. Every list becomes a header row
/// followed by one row per card (`Points | Story | Description`) and an empty
/// spacer row. Points is the estimate token, Story the title without markers.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::ExportError;
use crate::codec;
use crate::types::MarkerKind;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardExport {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lists: Vec<ExportList>,
    #[serde(default)]
    pub cards: Vec<ExportCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportList {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportCard {
    #[serde(rename = "idList")]
    pub id_list: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

impl BoardExport {
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Download name: `<board name>.xls`, path separators replaced.
    pub fn file_name(&self) -> String {
        let name: String = self
            .name
            .trim()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        if name.is_empty() {
            "board.xls".to_string()
        } else {
            format!("{}.xls", name)
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_table(board: &BoardExport) -> String {
    let mut s = String::from("<table id=\"export\" border=1>");
    s.push_str("<tr><th>Points</th><th>Story</th><th>Description</th></tr>");
    for list in &board.lists {
        s.push_str(&format!(
            "<tr><th colspan=\"3\">{}</th></tr>",
            escape_html(&list.name)
        ));
        for card in board.cards.iter().filter(|c| c.id_list == list.id) {
            let decoded = codec::decode(&card.name, MarkerKind::Estimate);
            s.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(decoded.token.as_deref().unwrap_or("")),
                escape_html(&decoded.stripped),
                escape_html(&card.desc)
            ));
        }
        s.push_str("<tr><td colspan=3></td></tr>");
    }
    s.push_str("</table>");
    s
}

/// Write the table into `dir` and return the written path.
pub fn write_spreadsheet(board: &BoardExport, dir: &Path) -> Result<PathBuf, ExportError> {
    let path = dir.join(board.file_name());
    fs::write(&path, render_table(board))?;
    log::info!(
        "[storypoints.export] Wrote {} list(s), {} card(s) to {}",
        board.lists.len(),
        board.cards.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "name": "Sprint 12",
        "lists": [{"id": "l1", "name": "Todo"}, {"id": "l2", "name": "Done"}],
        "cards": [
            {"idList": "l1", "name": "(3) Build API", "desc": "REST & gRPC"},
            {"idList": "l2", "name": "Ship <it>", "desc": ""},
            {"idList": "l1", "name": "(?) Spike [1]", "desc": "x"}
        ]
    }"#;

    #[test]
    fn rows_grouped_by_list() {
        let board = BoardExport::from_json(EXPORT).unwrap();
        let html = render_table(&board);
        let todo = html.find("<th colspan=\"3\">Todo</th>").unwrap();
        let done = html.find("<th colspan=\"3\">Done</th>").unwrap();
        let api = html.find("Build API").unwrap();
        let spike = html.find("Spike").unwrap();
        let ship = html.find("Ship").unwrap();
        assert!(todo < api && api < spike && spike < done && done < ship);
        assert_eq!(html.matches("<tr><td colspan=3></td></tr>").count(), 2);
    }

    #[test]
    fn points_and_story_split() {
        let board = BoardExport::from_json(EXPORT).unwrap();
        let html = render_table(&board);
        assert!(html.contains("<tr><td>3</td><td>Build API</td><td>REST &amp; gRPC</td></tr>"));
        assert!(html.contains("<tr><td>?</td><td>Spike [1]</td><td>x</td></tr>"));
        assert!(html.contains("<tr><td></td><td>Ship &lt;it&gt;</td><td></td></tr>"));
    }

    #[test]
    fn file_name_from_board_name() {
        let board = BoardExport::from_json(EXPORT).unwrap();
        assert_eq!(board.file_name(), "Sprint 12.xls");
        assert_eq!(BoardExport::default().file_name(), "board.xls");
        let slashed = BoardExport {
            name: "a/b".to_string(),
            ..Default::default()
        };
        assert_eq!(slashed.file_name(), "a_b.xls");
    }

    #[test]
    fn write_to_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let board = BoardExport::from_json(EXPORT).unwrap();
        let path = write_spreadsheet(&board, dir.path()).unwrap();
        assert!(path.ends_with("Sprint 12.xls"));
        assert!(fs::read_to_string(path).unwrap().starts_with("<table"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            BoardExport::from_json("{\"lists\": 3}"),
            Err(ExportError::InvalidJson(_))
        ));
    }
}
