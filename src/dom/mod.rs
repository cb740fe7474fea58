//! Headless DOM: slotmap arena, markup parser, and the shared [`Document`].

pub mod document;
pub mod markup;
pub mod node;
pub mod query;
pub mod tree;

pub use document::Document;
pub use markup::MarkupError;
pub use node::{NodeData, NodeId, NodeKind};
pub use tree::Dom;
