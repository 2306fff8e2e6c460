//! Data models for Figma documents

mod file;
mod node;

pub use file::*;
pub use node::*;
