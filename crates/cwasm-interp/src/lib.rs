#![warn(clippy::pedantic)]

pub mod config;
pub mod driver;
pub mod error;
pub mod handle;
pub mod hook;
pub mod state;
pub mod streaming;

pub use config::InterpConfig;
pub use driver::{Decompressor, InputBuffer};
pub use error::{InterpError, StreamingError};
pub use handle::DecompressorHandle;
pub use hook::{ActionContext, ActionHook};
pub use state::{DecodedValue, DriverState, ResumeOutcome, Suspension};
pub use streaming::{StreamSummary, Transcript, decompress_chunks, decompress_stream};
