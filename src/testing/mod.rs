//! Headless testing framework: Pilot, snapshot helpers.
//!
//! Use the [`Pilot`] to drive a [`Document`](crate::dom::Document) and an
//! [`Application`](crate::app::Application) the way a user would. Use
//! [`render_tree`] and related helpers to capture markup as indented text for
//! snapshot-style assertions.

pub mod pilot;
pub mod snapshot;

pub use pilot::{Pilot, PilotError};
pub use snapshot::{render_children, render_tree, visible_text};
