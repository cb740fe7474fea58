//! Template sources for [`View::load_template`](super::View::load_template).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::dom::MarkupError;

/// Errors from loading or parsing a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to load template: {0}")]
    Io(#[from] io::Error),
    #[error("invalid template markup: {0}")]
    Markup(#[from] MarkupError),
}

/// Fetches template markup by URL.
pub trait TemplateLoader {
    fn load(&self, url: &str) -> impl Future<Output = Result<String, TemplateError>>;

    /// Load bypassing any cache the loader keeps.
    fn load_fresh(&self, url: &str) -> impl Future<Output = Result<String, TemplateError>> {
        self.load(url)
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Reads templates from files below a root directory.
#[derive(Debug, Clone)]
pub struct FileTemplateLoader {
    root: PathBuf,
}

impl FileTemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateLoader for FileTemplateLoader {
    async fn load(&self, url: &str) -> Result<String, TemplateError> {
        let path = self.root.join(url.trim_start_matches('/'));
        debug!(path = %path.display(), "loading template");
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Serves templates from memory.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateLoader {
    templates: HashMap<String, String>,
}

impl StaticTemplateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template (builder).
    pub fn with(mut self, url: &str, markup: &str) -> Self {
        self.templates.insert(url.to_owned(), markup.to_owned());
        self
    }
}

impl TemplateLoader for StaticTemplateLoader {
    async fn load(&self, url: &str) -> Result<String, TemplateError> {
        self.templates.get(url).cloned().ok_or_else(|| {
            TemplateError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no template at {url}"),
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Caches another loader's results by URL.
#[derive(Debug)]
pub struct TemplateCache<L> {
    loader: L,
    entries: RefCell<HashMap<String, String>>,
    enabled: Cell<bool>,
    misses: Cell<usize>,
}

impl<L: TemplateLoader> TemplateCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            entries: RefCell::new(HashMap::new()),
            enabled: Cell::new(true),
            misses: Cell::new(0),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
        if !enabled {
            self.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// How many loads reached the inner loader.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }
}

impl<L: TemplateLoader> TemplateLoader for TemplateCache<L> {
    async fn load(&self, url: &str) -> Result<String, TemplateError> {
        if self.is_enabled() {
            let hit = self.entries.borrow().get(url).cloned();
            if let Some(markup) = hit {
                return Ok(markup);
            }
        }
        let markup = self.load_fresh(url).await?;
        if self.is_enabled() {
            self.entries
                .borrow_mut()
                .insert(url.to_owned(), markup.clone());
        }
        Ok(markup)
    }

    async fn load_fresh(&self, url: &str) -> Result<String, TemplateError> {
        self.misses.set(self.misses.get() + 1);
        self.loader.load(url).await
    }
}
