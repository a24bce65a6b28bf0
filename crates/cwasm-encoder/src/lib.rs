#![warn(clippy::pedantic)]

pub mod block_writer;
pub mod error;
pub mod write_stream;

pub use block_writer::{BlockWriter, OpenBlock};
pub use error::EncodeError;
pub use write_stream::{ByteWriteStream, WriteStream};
