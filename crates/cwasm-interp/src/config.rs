use cwasm_wire::DEFAULT_PAGE_SIZE;
use cwasm_wire::leb128::chunks_in_word;

/// Configuration for a [`Decompressor`](crate::Decompressor).
///
/// ```text
/// ┌───────────────────────┬──────────────────────────────────────────────┐
/// │ Field                 │ Purpose                                      │
/// ├───────────────────────┼──────────────────────────────────────────────┤
/// │ page_size             │ Page capacity of the input and output queues │
/// │ max_buffered_output   │ Undrained output that triggers NeedOutput…   │
/// │ output_chunk_size     │ Yield ProducedOutput every n drainable bytes │
/// │ minimize_block_sizes  │ Rewrite block headers in shortest form       │
/// │ reserved_block_chunks │ Placeholder width for block size headers     │
/// │ reject_trailing_input │ Fail if input remains after the root node    │
/// │ collect_values        │ Record every transcoded value                │
/// │ max_nesting           │ Limit on the interpreter's frame stack       │
/// └───────────────────────┴──────────────────────────────────────────────┘
/// ```
///
/// `max_buffered_output` is checked only between steps and only when
/// some output is drainable. Output still inside an open block cannot be
/// drained, so it may grow past the limit until the block closes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpConfig {
    pub page_size: usize,

    pub max_buffered_output: usize,

    /// When set, `resume()` returns `ProducedOutput` each time another
    /// `n` bytes become drainable. When `None`, output is only reported
    /// through `NeedOutputSpace` and `Finished`.
    pub output_chunk_size: Option<usize>,

    pub minimize_block_sizes: bool,

    pub reserved_block_chunks: u32,

    /// When set, the driver finishes only once the input is closed and
    /// fully consumed; leftover bytes fail with `TrailingData`.
    pub reject_trailing_input: bool,

    pub collect_values: bool,

    pub max_nesting: usize,
}

impl Default for InterpConfig {
    /// 4 KiB pages, 64 KiB of buffered output, no chunked yields,
    /// minimized block headers with a 32-bit placeholder, strict trailing
    /// input, no value collection, 1024 frames.
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_buffered_output: 64 * 1024,
            output_chunk_size: None,
            minimize_block_sizes: true,
            reserved_block_chunks: chunks_in_word(32),
            reject_trailing_input: true,
            collect_values: false,
            max_nesting: 1024,
        }
    }
}
