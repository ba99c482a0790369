pub mod router;
pub mod self_write;
pub mod types;
