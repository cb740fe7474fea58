//! Reactive state: observable property tables and deferred work.
//!
//! - [`Observable`]: dispatcher plus property slots, with bindable fields that
//!   notify `change:<name>` and `change` on write.
//! - [`EventTarget`], [`Bindable`], [`Injectable`]: capability traits entities
//!   implement.
//! - [`scheduler`]: the next-tick task queue.

pub mod observable;
pub mod property;
pub mod scheduler;
pub mod traits;

pub use observable::{Observable, WeakObservable};
pub use property::{is_private, Accessor, PRIVATE_PREFIX};
pub use scheduler::{defer, flush};
pub use traits::{Bindable, EventTarget, Injectable};
