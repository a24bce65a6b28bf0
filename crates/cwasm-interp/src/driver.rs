use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::Bytes;
use cwasm_decoder::{BlockReader, ByteReadStream, EnteredBlock, ReadStream, ValueAccumulator};
use cwasm_encoder::{BlockWriter, ByteWriteStream, OpenBlock, WriteStream};
use cwasm_format::{ActionId, Format, FormatError, Node, NodeId, NodeKind, ValueKind};
use cwasm_wire::{BitAddress, Queue, ReadCursor, StreamKind, WriteCursor};
use tracing::{debug, trace};

use crate::config::InterpConfig;
use crate::error::InterpError;
use crate::hook::{ActionContext, ActionHook};
use crate::state::{DecodedValue, DriverState, ResumeOutcome, Suspension};

/// Work left on the interpreter's explicit stack.
///
/// The tree walk never recurses on the Rust stack: every node that still
/// has work to do is a frame, so a suspension can return to the caller at
/// any point and pick up from the same frame later.
#[derive(Debug)]
enum Frame {
    Visit(NodeId),
    Sequence {
        id: NodeId,
        next: usize,
    },
    Loop {
        id: NodeId,
        body: NodeId,
        remaining: u64,
        last: Option<BitAddress>,
    },
    Block {
        input: EnteredBlock,
        output: OpenBlock,
    },
    UntilEof {
        id: NodeId,
        body: NodeId,
        last: Option<BitAddress>,
    },
}

/// What a value read in progress is for.
#[derive(Debug)]
enum Purpose {
    Value,
    LoopCount { id: NodeId, body: NodeId },
    BlockSize { body: NodeId },
}

/// A value whose bytes may straddle input buffers.
#[derive(Debug)]
struct Pending {
    purpose: Purpose,
    acc: ValueAccumulator,
    address: usize,
}

enum Progress {
    Advanced,
    NeedInput,
    Done,
}

/// Resumable interpreter over a format-description tree.
///
/// Reads typed values from the input queue and writes them to the output
/// queue as the tree directs, re-framing blocks on the way. The caller
/// feeds input and drains output in whatever chunk sizes it has; the
/// driver returns from [`resume`](Self::resume) whenever it must wait.
///
/// ```text
///   supply_input ──▶ [input Queue] ──▶ ReadCursor ──▶ step() ──▶ WriteCursor
///                                                                   │
///   drain ◀──────────────────────────── [output Queue] ◀────────────┘
/// ```
///
/// Output inside a block that is still open is held back from draining
/// until the block's size header has been patched.
pub struct Decompressor {
    format: Arc<Format>,
    config: InterpConfig,
    state: DriverState,
    input: ReadCursor,
    output: WriteCursor,
    reader: ByteReadStream,
    writer: ByteWriteStream,
    blocks_in: BlockReader,
    blocks_out: BlockWriter,
    frames: Vec<Frame>,
    pending: Option<Pending>,
    hook: Option<Box<dyn ActionHook>>,
    values: Vec<DecodedValue>,
    drained: usize,
    next_yield: usize,
    steps: u64,
}

fn lookup(format: &Format, id: NodeId) -> Result<&Node, InterpError> {
    format
        .node(id)
        .ok_or(InterpError::InvalidFormat(FormatError::UnknownNode { id }))
}

impl Decompressor {
    #[must_use]
    pub fn new(format: Arc<Format>, config: InterpConfig) -> Self {
        let input = ReadCursor::new(Queue::with_page_size(config.page_size), StreamKind::Byte);
        let output = WriteCursor::new(Queue::with_page_size(config.page_size), StreamKind::Byte);
        let blocks_out = BlockWriter::new()
            .with_reserved_chunks(config.reserved_block_chunks)
            .with_minimize(config.minimize_block_sizes);
        let next_yield = config
            .output_chunk_size
            .map_or(usize::MAX, |n| n.max(1));
        debug!(
            nodes = format.len(),
            page_size = config.page_size,
            "created decompressor"
        );
        Self {
            frames: vec![Frame::Visit(format.root())],
            format,
            config,
            state: DriverState::Created,
            input,
            output,
            reader: ByteReadStream,
            writer: ByteWriteStream,
            blocks_in: BlockReader::new(),
            blocks_out,
            pending: None,
            hook: None,
            values: Vec::new(),
            drained: 0,
            next_yield,
            steps: 0,
        }
    }

    /// Register the callback for action nodes. Without one, every action
    /// succeeds.
    #[must_use]
    pub fn with_action_hook(mut self, hook: impl ActionHook + 'static) -> Self {
        self.set_action_hook(hook);
        self
    }

    pub fn set_action_hook(&mut self, hook: impl ActionHook + 'static) {
        self.hook = Some(Box::new(hook));
    }

    #[must_use]
    pub fn format(&self) -> &Arc<Format> {
        &self.format
    }

    #[must_use]
    pub fn config(&self) -> &InterpConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &DriverState {
        &self.state
    }

    #[must_use]
    pub fn input_queue(&self) -> &Arc<Queue> {
        self.input.queue()
    }

    #[must_use]
    pub fn output_queue(&self) -> &Arc<Queue> {
        self.output.queue()
    }

    #[must_use]
    pub fn input_address(&self) -> usize {
        self.input.address()
    }

    #[must_use]
    pub fn output_address(&self) -> usize {
        self.output.address()
    }

    /// Steps executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Values recorded so far (only with `collect_values`).
    #[must_use]
    pub fn values(&self) -> &[DecodedValue] {
        &self.values
    }

    pub fn take_values(&mut self) -> Vec<DecodedValue> {
        mem::take(&mut self.values)
    }

    /// Bytes already handed out by [`drain`](Self::drain).
    #[must_use]
    pub fn drained(&self) -> usize {
        self.drained
    }

    /// Bytes that a drain would return right now.
    #[must_use]
    pub fn pending_output(&self) -> usize {
        self.drainable_end().saturating_sub(self.drained)
    }

    fn check_accepts_input(&self, operation: &'static str) -> Result<(), InterpError> {
        match self.state {
            DriverState::Created | DriverState::Suspended(Suspension::NeedInput) => Ok(()),
            ref other => Err(InterpError::InvalidState {
                operation,
                state: other.name(),
            }),
        }
    }

    /// Staging region for up to `size` input bytes. Nothing becomes
    /// readable until [`InputBuffer::commit`].
    ///
    /// # Errors
    ///
    /// [`InterpError::InvalidState`] unless the driver is `Created` or
    /// waiting for input.
    pub fn request_input_buffer(&mut self, size: usize) -> Result<InputBuffer<'_>, InterpError> {
        self.check_accepts_input("supply input")?;
        Ok(InputBuffer {
            driver: self,
            staging: vec![0; size],
        })
    }

    /// Copy `bytes` into the input. An empty slice closes the input.
    ///
    /// # Errors
    ///
    /// [`InterpError::InvalidState`] unless the driver is `Created` or
    /// waiting for input; wire errors if the input is already closed.
    pub fn supply_input(&mut self, bytes: &[u8]) -> Result<(), InterpError> {
        self.check_accepts_input("supply input")?;
        if bytes.is_empty() {
            return self.close_input();
        }
        self.append_input(bytes)
    }

    /// Declare that no more input will arrive.
    ///
    /// # Errors
    ///
    /// [`InterpError::InvalidState`] unless the driver is `Created` or
    /// waiting for input.
    pub fn close_input(&mut self) -> Result<(), InterpError> {
        self.check_accepts_input("close input")?;
        let queue = self.input.queue();
        let eof = queue.fill_address();
        queue.freeze_eof(eof)?;
        debug!(eof, "input closed");
        Ok(())
    }

    fn append_input(&mut self, bytes: &[u8]) -> Result<(), InterpError> {
        let queue = Arc::clone(self.input.queue());
        let released = queue.evict_before(self.input.address());
        let fill = queue.append(bytes)?;
        trace!(len = bytes.len(), fill, released, "supplied input");
        Ok(())
    }

    /// Run until the driver must wait, fails, or finishes.
    ///
    /// Terminal states are sticky: resuming a finished or failed driver
    /// returns the same outcome again.
    pub fn resume(&mut self) -> ResumeOutcome {
        match &self.state {
            DriverState::Finished => return ResumeOutcome::Finished,
            DriverState::Failed(e) => return ResumeOutcome::Failed(e.clone()),
            _ => {}
        }
        self.set_state(DriverState::Running);
        loop {
            if let Some(suspension) = self.output_pressure() {
                self.set_state(DriverState::Suspended(suspension));
                return suspension.into();
            }
            match self.step() {
                Ok(Progress::Advanced) => self.steps += 1,
                Ok(Progress::NeedInput) => {
                    self.set_state(DriverState::Suspended(Suspension::NeedInput));
                    return ResumeOutcome::NeedInput;
                }
                Ok(Progress::Done) => {
                    if let Err(e) = self.finish_output() {
                        return self.fail(e);
                    }
                    self.set_state(DriverState::Finished);
                    return ResumeOutcome::Finished;
                }
                Err(e) => return self.fail(e),
            }
        }
    }

    /// Up to `max` of the next drainable output bytes. Never returns the
    /// same byte twice.
    ///
    /// # Errors
    ///
    /// [`InterpError::BrokenCursor`] if the output queue was invalidated.
    pub fn request_output_buffer(&mut self, max: usize) -> Result<Bytes, InterpError> {
        let len = self.pending_output().min(max);
        if len == 0 {
            return Ok(Bytes::new());
        }
        let queue = Arc::clone(self.output.queue());
        let bytes = queue.copy_out(self.drained, len)?;
        self.drained += len;
        let released = queue.evict_before(self.drained);
        trace!(len, drained = self.drained, released, "drained output");
        Ok(bytes)
    }

    /// All currently drainable output.
    ///
    /// # Errors
    ///
    /// See [`request_output_buffer`](Self::request_output_buffer).
    pub fn drain(&mut self) -> Result<Bytes, InterpError> {
        self.request_output_buffer(usize::MAX)
    }

    fn set_state(&mut self, next: DriverState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, steps = self.steps, "state transition");
            self.state = next;
        }
    }

    fn fail(&mut self, error: InterpError) -> ResumeOutcome {
        debug!(%error, input = self.input.address(), "decompressor failed");
        self.set_state(DriverState::Failed(error.clone()));
        ResumeOutcome::Failed(error)
    }

    /// Start of the outermost open output block, or the fill address.
    fn drainable_end(&self) -> usize {
        self.frames
            .iter()
            .find_map(|f| match f {
                Frame::Block { output, .. } => Some(output.start()),
                _ => None,
            })
            .unwrap_or_else(|| self.output.queue().fill_address())
    }

    fn output_pressure(&mut self) -> Option<Suspension> {
        let end = self.drainable_end();
        if end <= self.drained {
            return None;
        }
        let buffered = self.output.queue().fill_address().saturating_sub(self.drained);
        if buffered >= self.config.max_buffered_output {
            return Some(Suspension::NeedOutputSpace);
        }
        if end >= self.next_yield {
            if let Some(chunk) = self.config.output_chunk_size {
                self.next_yield = end.saturating_add(chunk.max(1));
                return Some(Suspension::OutputReady);
            }
        }
        None
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), InterpError> {
        if self.frames.len() >= self.config.max_nesting {
            return Err(InterpError::NestingTooDeep {
                limit: self.config.max_nesting,
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    fn step(&mut self) -> Result<Progress, InterpError> {
        if let Some(mut pending) = self.pending.take() {
            return match self.reader.resume_value(&mut self.input, &mut pending.acc) {
                Ok(value) => self.complete_value(pending, value),
                Err(e) if e.is_suspension() => {
                    trace!(
                        consumed = pending.acc.bytes_consumed(),
                        address = self.input.address(),
                        "value waiting for input"
                    );
                    self.pending = Some(pending);
                    Ok(Progress::NeedInput)
                }
                Err(e) => Err(e.into()),
            };
        }

        let Some(frame) = self.frames.pop() else {
            return self.check_trailing_input();
        };
        match frame {
            Frame::Visit(id) => self.visit(id),
            Frame::Sequence { id, next } => self.next_in_sequence(id, next),
            Frame::Loop {
                id,
                body,
                remaining,
                last,
            } => self.next_iteration(id, body, remaining, last),
            Frame::Block { input, output } => self.close_block(input, output),
            Frame::UntilEof { id, body, last } => self.until_eof(id, body, last),
        }
    }

    fn visit(&mut self, id: NodeId) -> Result<Progress, InterpError> {
        let format = Arc::clone(&self.format);
        match lookup(&format, id)? {
            Node::Value(kind) => self.begin_value(Purpose::Value, *kind),
            Node::Action(action) => self.run_action(*action)?,
            Node::Sequence(_) => self.push_frame(Frame::Sequence { id, next: 0 })?,
            Node::Loop { count, body } => {
                self.begin_value(Purpose::LoopCount { id, body: *body }, *count);
            }
            Node::Block(body) => {
                self.begin_value(Purpose::BlockSize { body: *body }, ValueKind::Varuint32);
            }
            Node::UntilEof(body) => self.push_frame(Frame::UntilEof {
                id,
                body: *body,
                last: None,
            })?,
            Node::Opaque(op) => {
                return Err(InterpError::UnsupportedFormat {
                    kind: NodeKind::Unknown(*op),
                });
            }
        }
        Ok(Progress::Advanced)
    }

    fn begin_value(&mut self, purpose: Purpose, kind: ValueKind) {
        self.pending = Some(Pending {
            purpose,
            acc: ValueAccumulator::new(kind),
            address: self.input.address(),
        });
    }

    fn complete_value(&mut self, pending: Pending, value: u64) -> Result<Progress, InterpError> {
        let Pending {
            purpose,
            acc,
            address,
        } = pending;
        let kind = acc.kind();
        match purpose {
            Purpose::Value => {
                self.writer.write_kind(value, &mut self.output, kind)?;
                trace!(%kind, value, address, "transcoded value");
                self.record(kind, value, address);
            }
            Purpose::LoopCount { id, body } => {
                self.writer.write_kind(value, &mut self.output, kind)?;
                trace!(count = value, address, "entering loop");
                self.record(kind, value, address);
                self.push_frame(Frame::Loop {
                    id,
                    body,
                    remaining: value,
                    last: None,
                })?;
            }
            Purpose::BlockSize { body } => {
                #[allow(clippy::cast_possible_truncation)]
                let size = value as usize;
                let input = self.blocks_in.enter_sized(&mut self.input, size)?;
                let output = self.blocks_out.begin(&mut self.output)?;
                debug!(
                    input_start = input.body_start(),
                    size,
                    output_start = output.start(),
                    depth = self.input.block_depth(),
                    "opened block"
                );
                self.push_frame(Frame::Block { input, output })?;
                self.push_frame(Frame::Visit(body))?;
            }
        }
        Ok(Progress::Advanced)
    }

    fn record(&mut self, kind: ValueKind, value: u64, address: usize) {
        if self.config.collect_values {
            self.values.push(DecodedValue {
                kind,
                value,
                address,
            });
        }
    }

    fn run_action(&mut self, action: ActionId) -> Result<(), InterpError> {
        let ctx = ActionContext {
            action,
            input_address: self.input.address(),
            output_address: self.output.address(),
        };
        let ok = self.hook.as_mut().is_none_or(|hook| hook.on_action(&ctx));
        trace!(%action, ok, "ran action");
        if ok {
            Ok(())
        } else {
            Err(InterpError::ActionFailed { action })
        }
    }

    fn next_in_sequence(&mut self, id: NodeId, next: usize) -> Result<Progress, InterpError> {
        let format = Arc::clone(&self.format);
        if let Some(&child) = lookup(&format, id)?.children().get(next) {
            self.frames.push(Frame::Sequence { id, next: next + 1 });
            self.push_frame(Frame::Visit(child))?;
        }
        Ok(Progress::Advanced)
    }

    /// An iteration that consumed no input would repeat identically for
    /// every remaining count, so it fails instead of spinning.
    fn next_iteration(
        &mut self,
        id: NodeId,
        body: NodeId,
        remaining: u64,
        last: Option<BitAddress>,
    ) -> Result<Progress, InterpError> {
        if remaining == 0 {
            return Ok(Progress::Advanced);
        }
        let here = self.input.bit_address();
        if last == Some(here) {
            return Err(InterpError::EmptyLoopBody { node: id });
        }
        self.frames.push(Frame::Loop {
            id,
            body,
            remaining: remaining - 1,
            last: Some(here),
        });
        self.push_frame(Frame::Visit(body))?;
        Ok(Progress::Advanced)
    }

    fn close_block(&mut self, input: EnteredBlock, output: OpenBlock) -> Result<Progress, InterpError> {
        self.blocks_in.leave(&mut self.input, input)?;
        let start = output.start();
        let size = self.blocks_out.finish(&mut self.output, output)?;
        debug!(output_start = start, size, "closed block");
        Ok(Progress::Advanced)
    }

    fn until_eof(
        &mut self,
        id: NodeId,
        body: NodeId,
        last: Option<BitAddress>,
    ) -> Result<Progress, InterpError> {
        let here = self.input.bit_address();
        if here >= self.input.eob_address() {
            return Ok(Progress::Advanced);
        }
        if last == Some(here) {
            return Err(InterpError::EmptyLoopBody { node: id });
        }
        if self.input.available() == 0 && self.input.eob().is_root() {
            // Unbounded and out of data: only more input or a close can
            // tell whether another iteration follows.
            self.frames.push(Frame::UntilEof { id, body, last });
            return Ok(Progress::NeedInput);
        }
        self.frames.push(Frame::UntilEof {
            id,
            body,
            last: Some(here),
        });
        self.push_frame(Frame::Visit(body))?;
        Ok(Progress::Advanced)
    }

    fn check_trailing_input(&self) -> Result<Progress, InterpError> {
        if !self.config.reject_trailing_input {
            return Ok(Progress::Done);
        }
        let extra = self.input.available();
        if extra > 0 {
            return Err(InterpError::TrailingData { extra_bytes: extra });
        }
        if self.input.is_eof_frozen() {
            Ok(Progress::Done)
        } else {
            Ok(Progress::NeedInput)
        }
    }

    fn finish_output(&mut self) -> Result<(), InterpError> {
        self.output.align_to_byte()?;
        let queue = self.output.queue();
        let end = queue.fill_address();
        queue.freeze_eof(end)?;
        debug!(steps = self.steps, output_bytes = end, "finished");
        Ok(())
    }
}

impl Drop for Decompressor {
    fn drop(&mut self) {
        self.input.queue().mark_broken();
        self.output.queue().mark_broken();
        trace!(state = %self.state, "released decompressor");
    }
}

impl fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decompressor")
            .field("state", &self.state)
            .field("input", &self.input.address())
            .field("output", &self.output.address())
            .field("frames", &self.frames.len())
            .field("drained", &self.drained)
            .finish_non_exhaustive()
    }
}

/// Writable staging region returned by
/// [`Decompressor::request_input_buffer`]. Dropping it without
/// committing discards its contents.
pub struct InputBuffer<'a> {
    driver: &'a mut Decompressor,
    staging: Vec<u8>,
}

impl InputBuffer<'_> {
    /// Make the first `len` staged bytes readable.
    ///
    /// # Errors
    ///
    /// Wire errors if the input was closed in the meantime.
    pub fn commit(self, len: usize) -> Result<(), InterpError> {
        let Self { driver, staging } = self;
        let len = len.min(staging.len());
        if len == 0 {
            return Ok(());
        }
        driver.append_input(&staging[..len])
    }
}

impl Deref for InputBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.staging
    }
}

impl DerefMut for InputBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }
}
