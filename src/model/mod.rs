//! Bindable entities: [`Hash`] (key/value) and [`List`] (sequence).

pub mod hash;
pub mod item_class;
pub mod list;

pub use hash::{Hash, HashOptions};
pub use item_class::ItemClass;
pub use list::{List, ListOptions};
