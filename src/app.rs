//! Application: the root view of a document region.
//!
//! [`Application`] finds (or creates) its `cb-app` element, builds a
//! [`Context`] around the view registry and binds the root [`View`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::Binder;
use crate::context::Context;
use crate::dom::{Document, NodeId};
use crate::reactive::scheduler;
use crate::view::{View, ViewOptions, ViewRegistry};

/// Class marking application roots.
pub const APP_CLASS: &str = "cb-app";

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Matched against the `cb-app` attribute of the root element.
    pub name: String,
    /// Cache templates loaded by URL.
    pub template_cache_enabled: bool,
    /// Fill and bind views as soon as they are constructed.
    pub auto_init_template: bool,
    /// Log recoverable binding warnings.
    pub log_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "app".to_owned(),
            template_cache_enabled: true,
            auto_init_template: true,
            log_enabled: true,
        }
    }
}

impl AppConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a config from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the name (builder).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable the template cache (builder).
    pub fn with_template_cache(mut self, enabled: bool) -> Self {
        self.template_cache_enabled = enabled;
        self
    }

    /// Enable or disable automatic template initialization (builder).
    pub fn with_auto_init_template(mut self, enabled: bool) -> Self {
        self.auto_init_template = enabled;
        self
    }

    /// Enable or disable binding warnings (builder).
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// The main application struct.
///
/// Owns the root view, its context and registry, and the config.
pub struct Application {
    pub config: AppConfig,
    document: Document,
    context: Context,
    binder: Binder,
    view: View,
}

impl Application {
    /// Start an application with an empty registry.
    pub fn new(document: &Document, config: AppConfig) -> Self {
        Self::with_registry(document, config, ViewRegistry::new(), |options| options)
    }

    /// Start an application resolving nested views through `registry`.
    /// `configure` adjusts the root view's options (template, properties,
    /// setup hook) before it is built.
    pub fn with_registry(
        document: &Document,
        config: AppConfig,
        registry: ViewRegistry,
        configure: impl FnOnce(ViewOptions) -> ViewOptions,
    ) -> Self {
        let element = Self::find_root(document, &config.name);
        document.add_class(element, APP_CLASS);

        let context = Context::with_registry(registry.clone());
        let binder = Binder::new();
        binder.set_log_enabled(config.log_enabled);

        let options = ViewOptions::new(document)
            .element(element)
            .name(&config.name)
            .context(context.clone())
            .binder(binder.clone())
            .registry(registry)
            .auto_init_template(config.auto_init_template)
            .template_cache_enabled(config.template_cache_enabled);
        let view = View::new(configure(options));
        debug!(name = %config.name, "application started");

        let app = Self {
            config,
            document: document.clone(),
            context,
            binder,
            view,
        };
        app.process();
        app
    }

    /// Run every deferred task: `bind` events, `init` and anything they
    /// schedule in turn. Call after driving the document from outside.
    /// Returns how many tasks ran.
    pub fn process(&self) -> usize {
        let ran = scheduler::flush();
        if ran > 0 {
            debug!(tasks = ran, "deferred work processed");
        }
        ran
    }

    /// The element whose `cb-app` attribute names this application, or a new
    /// one appended to the body.
    fn find_root(document: &Document, name: &str) -> NodeId {
        let body = document.body();
        let existing = document
            .query_by_attribute(body, APP_CLASS)
            .into_iter()
            .find(|&el| document.attribute(el, APP_CLASS).as_deref() == Some(name));
        existing.unwrap_or_else(|| {
            let element = document.create_element("div");
            document.set_attribute(element, APP_CLASS, name);
            document.append_child(body, element);
            element
        })
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn registry(&self) -> ViewRegistry {
        self.context.registry().clone()
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn element(&self) -> NodeId {
        self.view.element()
    }

    /// Remove the root view and everything bound inside it.
    pub fn remove(&self) {
        self.view.remove();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
