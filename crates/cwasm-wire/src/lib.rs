#![warn(clippy::pedantic)]

pub mod address;
pub mod block_eob;
pub mod cursor;
pub mod error;
pub mod leb128;
pub mod page;
pub mod queue;

pub use address::{BitAddress, StreamKind};
pub use block_eob::BlockEob;
pub use cursor::{Cursor, PageCursor, ReadCursor, WriteCursor};
pub use error::WireError;
pub use page::{DEFAULT_PAGE_SIZE, Page};
pub use queue::Queue;
