//! Binding engine: `cb-*` directives linking entity properties to the DOM.
//!
//! - [`directive`]: the `path:param|parse` clause grammar (logos).
//! - [`attributes`]: the directive table and built-in directives.
//! - [`repeat`]: `cb-repeat` item views.
//! - [`binder`]: [`Binder`], which installs bindings and records them.
//! - [`record`]: [`BindingRecord`], one installed binding.

pub mod attributes;
pub mod binder;
pub mod directive;
pub mod record;
pub mod repeat;

pub use attributes::{AttributeTable, BindingOptions, Directive, DirectiveCall};
pub use binder::{default_parse, set_value, Binder, BindingError, BindingSource};
pub use directive::{clean_property_name, parse_clauses, Clause};
pub use record::BindingRecord;
