#![warn(clippy::pedantic)]

pub mod block_reader;
pub mod error;
pub mod read_stream;

pub use block_reader::{BlockReader, EnteredBlock};
pub use error::DecodeError;
pub use read_stream::{ByteReadStream, ReadStream, ValueAccumulator};
