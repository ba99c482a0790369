pub mod aggregate;
pub mod codec;
pub mod config;
pub mod debounce;
pub mod direction;
pub mod dom;
pub mod driver;
pub mod export;
pub mod picker;
pub mod pipeline;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod watcher;

pub use config::{PipelineConfig, Settings};
pub use dom::{Document, MemoryPage};
pub use pipeline::{Pipeline, PipelineError, PipelineStats};
pub use types::{NodeId, PointKind};
