//! Core library for Coltree, an editor for column-tagged JSON record trees.
//! Provides the addressable tree model, read-only filtering, and the
//! `{ columns, items }` document format with file-backed sessions.

pub mod document;
mod error;
pub mod filter;
mod item;
mod model;
mod session;
pub mod statics;
mod value;

pub use document::Document;
pub use error::{AddressError, FormatError};
pub use filter::{FilterColumn, Pattern};
pub use item::{Fields, Item, ItemArena, ItemId, ItemRecord};
pub use model::{ModelEvent, ModelObserver, TreeModel};
pub use session::{FileFormat, Session};
pub use value::{Map, Number, Value};
