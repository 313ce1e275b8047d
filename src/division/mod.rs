//! Division tree model
//!
//! This module provides the in-memory representation of one province's
//! administrative hierarchy while it is being walked.
//!
//! # Components
//!
//! - `Level`: the five hierarchy levels with their code widths and row markers
//! - `DivisionNode`: a recursive node owning its children in page order

mod level;
mod node;

// Re-export main types
pub use level::Level;
pub use node::{DivisionNode, PrefixViolation};
