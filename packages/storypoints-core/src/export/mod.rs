pub mod spreadsheet;

pub use spreadsheet::{render_table, write_spreadsheet, BoardExport, ExportCard, ExportList};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid board export: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
