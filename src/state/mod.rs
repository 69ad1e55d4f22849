//! State management module
//!
//! Per-stream cursor tracking between runs. A cursor is committed only
//! after its stream was extracted and loaded in full.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{State, StreamCursor};
