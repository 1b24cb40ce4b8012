//! State management module
//!
//! Tracks one resume token per partition so a change stream can continue
//! where the last checkpoint left off.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - fixed-length offset list with its JSON and SQL renderings
//! - `StateManager` - File-based state persistence

mod manager;
mod types;

pub use manager::StateManager;
pub use types::State;
