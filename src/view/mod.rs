//! Views: elements bound to a property scope, templates and the view
//! registry.

pub mod lifecycle;
pub mod registry;
pub mod template;

pub use lifecycle::{View, ViewOptions, WeakView, CONTENT_ATTRIBUTE, VIEW_CLASS};
pub use registry::{ViewFactory, ViewRegistry};
pub use template::{
    FileTemplateLoader, StaticTemplateLoader, TemplateCache, TemplateError, TemplateLoader,
};
