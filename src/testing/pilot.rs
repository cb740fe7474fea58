//! Pilot: programmatic interaction with a headless document.
//!
//! The `Pilot` wraps a [`Document`] and provides methods to mount markup,
//! simulate user input (typing, clicking, selecting), drain deferred work and
//! inspect the result by element id.

use crate::app::{AppConfig, Application};
use crate::dom::{Document, MarkupError, NodeId};
use crate::event::EventError;
use crate::reactive::scheduler;
use crate::view::ViewRegistry;

/// Errors from driving the pilot.
#[derive(Debug, thiserror::Error)]
pub enum PilotError {
    #[error("no element with id {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    Event(#[from] EventError),
}

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless document driver for testing.
///
/// Elements are addressed by their `id` attribute, searched from the body.
///
/// # Examples
///
/// ```ignore
/// use tether::testing::Pilot;
///
/// let pilot = Pilot::new();
/// pilot.mount("<div cb-app=\"app\"><input id=\"name\" cb-bind=\"name\"></div>")?;
/// let app = pilot.start(AppConfig::new());
/// pilot.type_text("name", "Ada")?;
/// assert_eq!(app.view().get("name"), Value::from("Ada"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pilot {
    document: Document,
}

impl Pilot {
    /// Create a pilot over an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pilot over an existing document.
    pub fn with_document(document: Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Replace the body's content with `markup`.
    pub fn mount(&self, markup: &str) -> Result<(), PilotError> {
        self.document.set_inner_html(self.document.body(), markup)?;
        Ok(())
    }

    /// Start an application over the mounted markup and run its deferred
    /// start-up work.
    pub fn start(&self, config: AppConfig) -> Application {
        self.start_with(config, ViewRegistry::new())
    }

    /// Like [`start`](Self::start), resolving nested views through `registry`.
    pub fn start_with(&self, config: AppConfig, registry: ViewRegistry) -> Application {
        let app = Application::with_registry(&self.document, config, registry, |o| o);
        self.flush();
        app
    }

    /// The element with the given id.
    pub fn find(&self, id: &str) -> Result<NodeId, PilotError> {
        self.document
            .get_element_by_id(self.document.body(), id)
            .ok_or_else(|| PilotError::NotFound(id.to_owned()))
    }

    // ── Input simulation ─────────────────────────────────────────────

    /// Set the value of a form control and dispatch `input`.
    pub fn type_text(&self, id: &str, text: &str) -> Result<(), PilotError> {
        let element = self.find(id)?;
        self.document.simulate_input(element, text)?;
        Ok(())
    }

    /// Check or uncheck a checkbox and dispatch `change`.
    pub fn toggle(&self, id: &str, checked: bool) -> Result<(), PilotError> {
        let element = self.find(id)?;
        self.document.set_checked(element, checked)?;
        Ok(())
    }

    /// Click an element.
    pub fn click(&self, id: &str) -> Result<(), PilotError> {
        let element = self.find(id)?;
        self.document.click(element)?;
        Ok(())
    }

    /// Pick the option of a select with the given value.
    pub fn select(&self, id: &str, value: &str) -> Result<(), PilotError> {
        let element = self.find(id)?;
        self.document.simulate_select(element, value)?;
        Ok(())
    }

    // ── Processing ───────────────────────────────────────────────────

    /// Run all deferred work. Returns how many tasks ran.
    pub fn flush(&self) -> usize {
        scheduler::flush()
    }

    // ── Query ────────────────────────────────────────────────────────

    /// The current value of a form control.
    pub fn value(&self, id: &str) -> Result<String, PilotError> {
        Ok(self.document.value(self.find(id)?))
    }

    pub fn text(&self, id: &str) -> Result<String, PilotError> {
        Ok(self.document.text_content(self.find(id)?))
    }

    pub fn has_class(&self, id: &str, class: &str) -> Result<bool, PilotError> {
        Ok(self.document.has_class(self.find(id)?, class))
    }

    /// Whether the element is shown: not hidden by `cb-hide` itself or any
    /// ancestor.
    pub fn is_visible(&self, id: &str) -> Result<bool, PilotError> {
        let element = self.find(id)?;
        let hidden = self
            .document
            .closest(element, |data| data.has_class("cb-hide"))
            .is_some();
        Ok(!hidden)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
