#![warn(clippy::pedantic)]

pub mod error;
pub mod format;
pub mod node;
pub mod value_kind;

pub use error::FormatError;
pub use format::{Format, FormatBuilder};
pub use node::{ActionId, Node, NodeId, NodeKind};
pub use value_kind::ValueKind;
